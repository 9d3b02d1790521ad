//! Decision and action-result types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Urgency attached to a decision by the reasoner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Immediate,
    High,
    Normal,
    Low,
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        UrgencyLevel::Normal
    }
}

/// A validated decision produced from a reasoner response.
///
/// `confidence_score` is always in `[0, 1]`: construction clamps it, and
/// nothing downstream may rely on raw reasoner output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    /// Action key resolved against the tool registry (open-ended catalog).
    pub action_type: String,
    /// Parameters forwarded verbatim to the action handler.
    pub parameters: Map<String, Value>,
    /// Free-text rationale from the reasoner.
    pub reasoning: String,
    /// Always clamped into [0, 1].
    pub confidence_score: f64,
    pub expected_impact: String,
    #[serde(default)]
    pub urgency_level: UrgencyLevel,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    /// Build a decision, clamping the confidence score into [0, 1].
    ///
    /// NaN confidence is treated as 0.0.
    pub fn new(
        action_type: impl Into<String>,
        parameters: Map<String, Value>,
        reasoning: impl Into<String>,
        confidence_score: f64,
        expected_impact: impl Into<String>,
        urgency_level: UrgencyLevel,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type: action_type.into(),
            parameters,
            reasoning: reasoning.into(),
            confidence_score: clamp_confidence(confidence_score),
            expected_impact: expected_impact.into(),
            urgency_level,
            created_at: Utc::now(),
        }
    }
}

/// Clamp a raw confidence value into [0, 1]; NaN becomes 0.0.
pub fn clamp_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Outcome of a single action handler invocation.
///
/// Created per invocation, forwarded to the audit sink, then discarded;
/// the pipeline keeps no in-memory history of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action_type: String,
    pub message: String,
    /// Opaque handler-owned impact summary.
    pub business_impact: Map<String, Value>,
    pub execution_time_ms: u64,
    pub cost: f64,
}

impl ActionResult {
    /// A failed result carrying only a message, used for handled failures
    /// such as unknown action types.
    pub fn failure(action_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            action_type: action_type.into(),
            message: message.into(),
            business_impact: Map::new(),
            execution_time_ms: 0,
            cost: 0.0,
        }
    }
}
