//! Confidence-gated execution routing.

use serde::Serialize;

use vantage_core::config::RoutingConfig;
use vantage_core::error::VantageError;

/// How a decision is executed, from most to least autonomous.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Execute immediately through the tool registry.
    Autonomous,
    /// Issue a time-boxed recommendation requiring approval.
    Advisory,
    /// Log for monitoring only.
    Alert,
}

/// Pure classifier from confidence score to execution mode.
///
/// Construction validates `0 <= advisory < autonomous <= 1`, so `route`
/// itself is infallible and monotonic: a higher score never yields a less
/// autonomous mode.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceRouter {
    autonomous_threshold: f64,
    advisory_threshold: f64,
}

impl ConfidenceRouter {
    pub fn from_config(config: &RoutingConfig) -> Result<Self, VantageError> {
        config.validate()?;
        Ok(Self {
            autonomous_threshold: config.autonomous_threshold,
            advisory_threshold: config.advisory_threshold,
        })
    }

    pub fn route(&self, confidence_score: f64) -> ExecutionMode {
        if confidence_score >= self.autonomous_threshold {
            ExecutionMode::Autonomous
        } else if confidence_score >= self.advisory_threshold {
            ExecutionMode::Advisory
        } else {
            ExecutionMode::Alert
        }
    }
}
