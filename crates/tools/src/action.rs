//! Action handler trait and category discriminator.
//!
//! Handlers are the pluggable edge of the pipeline: opaque, idempotent, and
//! contractually unable to fail across the boundary: an error is an
//! [`ActionResult`] with `success = false`, never a panic or `Err`.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vantage_core::decision::ActionResult;

/// Closed set of action categories.
///
/// The action catalog itself is open-ended (string-keyed at the final
/// registry lookup), but every registered handler declares which of these
/// categories it belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Financial,
    Competitive,
    Customer,
    Operational,
    Communication,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionCategory::Financial => "financial",
            ActionCategory::Competitive => "competitive",
            ActionCategory::Customer => "customer",
            ActionCategory::Operational => "operational",
            ActionCategory::Communication => "communication",
        };
        write!(f, "{s}")
    }
}

/// The extension point for business actions.
///
/// `execute` never returns an error: handlers own their failure modes and
/// report them through `ActionResult::success`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Action key this handler answers to (e.g., "adjust_pricing").
    fn name(&self) -> &str;

    /// Category the action belongs to.
    fn category(&self) -> ActionCategory;

    /// Execute with decision parameters. Must be idempotent.
    async fn execute(&self, parameters: &Map<String, Value>) -> ActionResult;
}
