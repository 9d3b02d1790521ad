//! Built-in action handlers.
//!
//! Real deployments register their own catalog; these cover the wiring the
//! pipeline itself depends on (the fallback monitor action) plus a
//! configurable stub for tests.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use vantage_core::decision::ActionResult;

use crate::action::{ActionCategory, ActionHandler};
use crate::registry::{RegistryError, ToolRegistry};

/// The action behind fallback decisions: observe, summarize, do nothing.
pub struct MonitorAndReportTool;

#[async_trait]
impl ActionHandler for MonitorAndReportTool {
    fn name(&self) -> &str {
        "monitor_and_report"
    }

    fn category(&self) -> ActionCategory {
        ActionCategory::Operational
    }

    async fn execute(&self, parameters: &Map<String, Value>) -> ActionResult {
        let start = Instant::now();
        info!(params = parameters.len(), "monitor_and_report: no-op observation pass");
        ActionResult {
            success: true,
            action_type: self.name().to_string(),
            message: "situation recorded for monitoring".to_string(),
            business_impact: Map::from_iter([("observed".to_string(), json!(true))]),
            execution_time_ms: start.elapsed().as_millis() as u64,
            cost: 0.0,
        }
    }
}

/// Configurable stub handler for tests and demo wiring.
pub struct StubTool {
    name: String,
    category: ActionCategory,
    succeed: bool,
}

impl StubTool {
    pub fn succeeding(name: impl Into<String>, category: ActionCategory) -> Self {
        Self {
            name: name.into(),
            category,
            succeed: true,
        }
    }

    pub fn failing(name: impl Into<String>, category: ActionCategory) -> Self {
        Self {
            name: name.into(),
            category,
            succeed: false,
        }
    }
}

#[async_trait]
impl ActionHandler for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ActionCategory {
        self.category
    }

    async fn execute(&self, parameters: &Map<String, Value>) -> ActionResult {
        let start = Instant::now();
        ActionResult {
            success: self.succeed,
            action_type: self.name.clone(),
            message: if self.succeed {
                format!("{} completed", self.name)
            } else {
                format!("{} failed (stubbed failure)", self.name)
            },
            business_impact: Map::from_iter([(
                "parameters_seen".to_string(),
                json!(parameters.len()),
            )]),
            execution_time_ms: start.elapsed().as_millis() as u64,
            cost: if self.succeed { 1.0 } else { 0.0 },
        }
    }
}

/// Registry pre-loaded with the handlers the pipeline itself relies on.
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(MonitorAndReportTool)?;
    Ok(registry)
}
