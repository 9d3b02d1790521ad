//! Execution of routed decisions.
//!
//! Autonomous decisions resolve against the injected tool registry and run;
//! advisory decisions become time-boxed recommendations; alert decisions
//! only log. Every branch writes exactly one audit record before returning,
//! and no branch can fail: unknown actions become failed step results, and
//! audit sink failures are swallowed upstream.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use vantage_core::decision::{ActionResult, Decision};
use vantage_core::event::IntelligenceEvent;
use vantage_tools::registry::ToolRegistry;

use crate::audit::{append_or_log, AuditKind, AuditRecord, AuditSink};
use crate::router::ExecutionMode;

/// Outcome of a multi-step autonomous plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    /// True iff the succeeded-step fraction reached the success-rate threshold.
    pub success: bool,
    pub success_rate: f64,
    pub results: Vec<ActionResult>,
}

/// A recommendation produced for advisory-mode decisions.
#[derive(Debug, Clone, Serialize)]
pub struct Advisory {
    pub decision: Decision,
    pub expires_at: DateTime<Utc>,
    /// Always true: an advisory never executes without a human.
    pub approval_required: bool,
}

/// Monitoring-only record for alert-mode decisions.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub decision: Decision,
    pub note: String,
}

/// What the dispatcher did with a routed decision.
#[derive(Debug, Clone, Serialize)]
pub enum ExecutionOutcome {
    Executed(PlanOutcome),
    Advised(Advisory),
    Alerted(AlertRecord),
}

/// One step of an autonomous plan.
struct PlanStep {
    action_type: String,
    parameters: Map<String, Value>,
}

/// Executes routed decisions against an injected registry and audit sink.
pub struct ActionDispatcher {
    registry: Arc<ToolRegistry>,
    audit: Arc<dyn AuditSink>,
    success_rate_threshold: f64,
    advisory_expiry: Duration,
}

impl ActionDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        audit: Arc<dyn AuditSink>,
        success_rate_threshold: f64,
        advisory_expiry: Duration,
    ) -> Self {
        Self {
            registry,
            audit,
            success_rate_threshold,
            advisory_expiry,
        }
    }

    /// Handle a routed decision. Infallible by contract.
    pub async fn handle(
        &self,
        event: &IntelligenceEvent,
        decision: &Decision,
        mode: ExecutionMode,
    ) -> ExecutionOutcome {
        match mode {
            ExecutionMode::Autonomous => {
                let outcome = self.execute_plan(decision).await;
                let record = AuditRecord::for_decision(
                    AuditKind::Execution,
                    event.id,
                    decision.id,
                    json!({
                        "action_type": decision.action_type,
                        "confidence": decision.confidence_score,
                        "plan": outcome,
                    }),
                );
                append_or_log(self.audit.as_ref(), record).await;
                ExecutionOutcome::Executed(outcome)
            }
            ExecutionMode::Advisory => {
                let advisory = Advisory {
                    decision: decision.clone(),
                    expires_at: Utc::now() + self.advisory_expiry,
                    approval_required: true,
                };
                info!(
                    action = %decision.action_type,
                    confidence = decision.confidence_score,
                    expires_at = %advisory.expires_at,
                    "advisory issued, approval required"
                );
                let record = AuditRecord::for_decision(
                    AuditKind::Advisory,
                    event.id,
                    decision.id,
                    json!({ "advisory": advisory }),
                );
                append_or_log(self.audit.as_ref(), record).await;
                ExecutionOutcome::Advised(advisory)
            }
            ExecutionMode::Alert => {
                let alert = AlertRecord {
                    decision: decision.clone(),
                    note: "confidence below advisory threshold, monitoring only".into(),
                };
                info!(
                    action = %decision.action_type,
                    confidence = decision.confidence_score,
                    "alert raised, no action taken"
                );
                let record = AuditRecord::for_decision(
                    AuditKind::Alert,
                    event.id,
                    decision.id,
                    json!({ "alert": alert }),
                );
                append_or_log(self.audit.as_ref(), record).await;
                ExecutionOutcome::Alerted(alert)
            }
        }
    }

    /// Run every plan step and aggregate.
    ///
    /// The plan succeeds iff the fraction of succeeded steps reaches the
    /// success-rate threshold, not "all steps succeeded".
    async fn execute_plan(&self, decision: &Decision) -> PlanOutcome {
        let steps = plan_steps(decision);
        let mut results = Vec::with_capacity(steps.len());
        for step in &steps {
            results.push(self.execute_step(step).await);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let success_rate = succeeded as f64 / results.len().max(1) as f64;
        let success = success_rate >= self.success_rate_threshold;
        info!(
            steps = results.len(),
            succeeded,
            success_rate,
            plan_success = success,
            "plan executed"
        );
        PlanOutcome {
            success,
            success_rate,
            results,
        }
    }

    /// Execute a single step. Missing handlers are a handled failure.
    async fn execute_step(&self, step: &PlanStep) -> ActionResult {
        match self.registry.get(&step.action_type) {
            Some(handler) => handler.execute(&step.parameters).await,
            None => {
                warn!(action = %step.action_type, "no handler registered");
                ActionResult::failure(
                    &step.action_type,
                    format!("unknown action: {}", step.action_type),
                )
            }
        }
    }
}

/// Explode a decision into plan steps.
///
/// A decision whose parameters carry a `steps` array is a multi-step plan;
/// anything else is a single step of the decision's own action.
fn plan_steps(decision: &Decision) -> Vec<PlanStep> {
    if let Some(Value::Array(raw_steps)) = decision.parameters.get("steps") {
        let steps: Vec<PlanStep> = raw_steps
            .iter()
            .filter_map(|raw| {
                let action_type = raw.get("action_type")?.as_str()?.to_string();
                let parameters = match raw.get("parameters") {
                    Some(Value::Object(map)) => map.clone(),
                    _ => Map::new(),
                };
                Some(PlanStep {
                    action_type,
                    parameters,
                })
            })
            .collect();
        if !steps.is_empty() {
            return steps;
        }
    }
    vec![PlanStep {
        action_type: decision.action_type.clone(),
        parameters: decision.parameters.clone(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use vantage_core::decision::UrgencyLevel;
    use vantage_core::event::{EventType, Priority};
    use vantage_tools::action::ActionCategory;
    use vantage_tools::handlers::StubTool;

    fn event() -> IntelligenceEvent {
        IntelligenceEvent::new(
            EventType::CustomerRisk,
            Priority::High,
            "customers",
            json!({}),
            None,
        )
    }

    fn decision(action: &str, confidence: f64, parameters: Map<String, Value>) -> Decision {
        Decision::new(action, parameters, "test", confidence, "test", UrgencyLevel::Normal)
    }

    fn steps_param(actions: &[&str]) -> Map<String, Value> {
        let steps: Vec<Value> = actions
            .iter()
            .map(|a| json!({"action_type": a, "parameters": {}}))
            .collect();
        Map::from_iter([("steps".to_string(), Value::Array(steps))])
    }

    fn dispatcher(registry: ToolRegistry, audit: Arc<MemoryAuditSink>) -> ActionDispatcher {
        ActionDispatcher::new(Arc::new(registry), audit, 0.7, Duration::hours(24))
    }

    #[tokio::test]
    async fn unknown_action_is_handled_failure() {
        let audit = Arc::new(MemoryAuditSink::new());
        let d = dispatcher(ToolRegistry::new(), Arc::clone(&audit));

        let outcome = d
            .handle(
                &event(),
                &decision("launch_rockets", 0.99, Map::new()),
                ExecutionMode::Autonomous,
            )
            .await;

        match outcome {
            ExecutionOutcome::Executed(plan) => {
                assert!(!plan.success);
                assert_eq!(plan.results.len(), 1);
                assert!(!plan.results[0].success);
                assert!(plan.results[0].message.contains("unknown action"));
            }
            other => panic!("expected Executed, got {other:?}"),
        }
        assert_eq!(audit.records_of(AuditKind::Execution).len(), 1);
    }

    #[tokio::test]
    async fn two_of_three_steps_is_a_failed_plan() {
        let mut registry = ToolRegistry::new();
        registry
            .register(StubTool::succeeding("ok_a", ActionCategory::Operational))
            .unwrap();
        registry
            .register(StubTool::succeeding("ok_b", ActionCategory::Operational))
            .unwrap();
        registry
            .register(StubTool::failing("bad", ActionCategory::Operational))
            .unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let d = dispatcher(registry, audit);

        let outcome = d
            .handle(
                &event(),
                &decision("plan", 0.9, steps_param(&["ok_a", "ok_b", "bad"])),
                ExecutionMode::Autonomous,
            )
            .await;

        match outcome {
            ExecutionOutcome::Executed(plan) => {
                // 2/3 ≈ 0.67 < 0.7
                assert!(!plan.success);
                assert!((plan.success_rate - 2.0 / 3.0).abs() < 1e-9);
            }
            other => panic!("expected Executed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn three_of_four_steps_is_a_successful_plan() {
        let mut registry = ToolRegistry::new();
        for name in ["a", "b", "c"] {
            registry
                .register(StubTool::succeeding(name, ActionCategory::Operational))
                .unwrap();
        }
        registry
            .register(StubTool::failing("bad", ActionCategory::Operational))
            .unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let d = dispatcher(registry, audit);

        let outcome = d
            .handle(
                &event(),
                &decision("plan", 0.9, steps_param(&["a", "b", "c", "bad"])),
                ExecutionMode::Autonomous,
            )
            .await;

        match outcome {
            ExecutionOutcome::Executed(plan) => {
                // 3/4 = 0.75 >= 0.7
                assert!(plan.success);
                assert_eq!(plan.success_rate, 0.75);
            }
            other => panic!("expected Executed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn advisory_carries_expiry_and_approval_flag() {
        let audit = Arc::new(MemoryAuditSink::new());
        let d = dispatcher(ToolRegistry::new(), Arc::clone(&audit));

        let before = Utc::now();
        let outcome = d
            .handle(
                &event(),
                &decision("adjust_pricing", 0.6, Map::new()),
                ExecutionMode::Advisory,
            )
            .await;

        match outcome {
            ExecutionOutcome::Advised(advisory) => {
                assert!(advisory.approval_required);
                let ttl = advisory.expires_at - before;
                assert!(ttl >= Duration::hours(23) && ttl <= Duration::hours(25));
            }
            other => panic!("expected Advised, got {other:?}"),
        }
        // No handler ran, exactly one audit record.
        assert_eq!(audit.len(), 1);
        assert_eq!(audit.records_of(AuditKind::Advisory).len(), 1);
    }

    #[tokio::test]
    async fn alert_only_audits() {
        let mut registry = ToolRegistry::new();
        registry
            .register(StubTool::succeeding("adjust_pricing", ActionCategory::Financial))
            .unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let d = dispatcher(registry, Arc::clone(&audit));

        let outcome = d
            .handle(
                &event(),
                &decision("adjust_pricing", 0.1, Map::new()),
                ExecutionMode::Alert,
            )
            .await;

        assert!(matches!(outcome, ExecutionOutcome::Alerted(_)));
        assert_eq!(audit.len(), 1);
        assert_eq!(audit.records_of(AuditKind::Alert).len(), 1);
    }

    #[tokio::test]
    async fn malformed_steps_fall_back_to_single_action() {
        let mut registry = ToolRegistry::new();
        registry
            .register(StubTool::succeeding("plan", ActionCategory::Operational))
            .unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let d = dispatcher(registry, audit);

        let params = Map::from_iter([("steps".to_string(), json!([{"no_action_type": 1}]))]);
        let outcome = d
            .handle(
                &event(),
                &decision("plan", 0.9, params),
                ExecutionMode::Autonomous,
            )
            .await;

        match outcome {
            ExecutionOutcome::Executed(plan) => {
                assert_eq!(plan.results.len(), 1);
                assert_eq!(plan.results[0].action_type, "plan");
                assert!(plan.success);
            }
            other => panic!("expected Executed, got {other:?}"),
        }
    }
}
