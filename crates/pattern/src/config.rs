//! Declarative pattern definitions.
//!
//! An [`EventPattern`] is configuration data, not persisted state: a
//! predicate over canonical event fields, a minimum matching-event count,
//! and a time window. Patterns are loaded from YAML at startup (see
//! [`crate::loader`]).

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vantage_core::event::{EventType, IntelligenceEvent, Priority};

use crate::error::PatternError;

/// Predicate over canonical event fields.
///
/// All present clauses must hold; absent clauses match anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatternConditions {
    /// Event types to match. Empty means any type.
    #[serde(default)]
    pub event_types: Vec<EventType>,
    /// Minimum priority (inclusive).
    #[serde(default)]
    pub min_priority: Option<Priority>,
    /// Exact source stream to match.
    #[serde(default)]
    pub source: Option<String>,
    /// Required equality on payload fields.
    #[serde(default)]
    pub data_equals: BTreeMap<String, Value>,
}

impl PatternConditions {
    /// Whether an event satisfies every clause of this predicate.
    pub fn matches(&self, event: &IntelligenceEvent) -> bool {
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if let Some(min) = self.min_priority {
            if event.priority < min {
                return false;
            }
        }
        if let Some(ref source) = self.source {
            if event.source != *source {
                return false;
            }
        }
        self.data_equals
            .iter()
            .all(|(key, expected)| event.data.get(key) == Some(expected))
    }
}

/// A single detection rule evaluated against the window cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EventPattern {
    pub pattern_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub conditions: PatternConditions,
    /// Minimum matching-event count for the pattern to fire.
    pub trigger_threshold: usize,
    /// Lookback window, in seconds.
    pub time_window_secs: u64,
    /// Scales matching count into a severity score on the synthetic event.
    pub severity_multiplier: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EventPattern {
    /// Enforce `trigger_threshold >= 1` and `time_window > 0`.
    pub fn validate(&self) -> Result<(), PatternError> {
        if self.trigger_threshold < 1 {
            return Err(PatternError::InvalidPattern {
                pattern_id: self.pattern_id.clone(),
                reason: "trigger_threshold must be at least 1".into(),
            });
        }
        if self.time_window_secs == 0 {
            return Err(PatternError::InvalidPattern {
                pattern_id: self.pattern_id.clone(),
                reason: "time_window_secs must be greater than zero".into(),
            });
        }
        if !(self.severity_multiplier > 0.0) {
            return Err(PatternError::InvalidPattern {
                pattern_id: self.pattern_id.clone(),
                reason: "severity_multiplier must be positive".into(),
            });
        }
        Ok(())
    }

    /// The pattern's lookback window as a chrono duration.
    pub fn time_window(&self) -> Duration {
        Duration::seconds(self.time_window_secs as i64)
    }
}

/// The longest window across a set of patterns, used as the cache retention horizon.
pub fn max_time_window(patterns: &[EventPattern]) -> Duration {
    patterns
        .iter()
        .map(EventPattern::time_window)
        .max()
        .unwrap_or_else(|| Duration::seconds(3_600))
}
