//! Decision dispatcher: the single consumer of the decision queue.
//!
//! Drains events strictly in arrival order; the priority field on events
//! is deliberately not used for reordering (kept as a documented
//! limitation). Each event becomes a bounded prompt, one reasoner call
//! (retried on transient failure), one parse attempt, and one routed
//! execution. Nothing on this path can take the loop down: parse failures
//! degrade to the fallback decision and audit failures are swallowed.
//!
//! The reasoner call carries no business timeout; shutdown is the only
//! thing that can interrupt it. When the queue stays empty for the poll
//! interval, an idle sweep heartbeat is logged and audited so liveness is
//! observable from outside.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use vantage_core::decision::Decision;
use vantage_core::event::IntelligenceEvent;
use vantage_reasoner::parse::{fallback_decision, parse_decision};
use vantage_reasoner::prompt::build_event_prompt;
use vantage_reasoner::provider::Reasoner;

use crate::actions::ActionDispatcher;
use crate::audit::{append_or_log, AuditKind, AuditRecord, AuditSink};
use crate::router::ConfidenceRouter;

/// How many times one reasoner call is attempted before degrading to the
/// fallback decision.
const REASONER_ATTEMPTS: u32 = 3;

pub struct DecisionDispatcher {
    reasoner: Arc<dyn Reasoner>,
    router: ConfidenceRouter,
    actions: ActionDispatcher,
    audit: Arc<dyn AuditSink>,
    /// Idle wait before a sweep heartbeat fires.
    poll_interval: Duration,
    /// Fixed backoff between reasoner attempts.
    retry_backoff: Duration,
}

impl DecisionDispatcher {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        router: ConfidenceRouter,
        actions: ActionDispatcher,
        audit: Arc<dyn AuditSink>,
        poll_interval: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            reasoner,
            router,
            actions,
            audit,
            poll_interval,
            retry_backoff,
        }
    }

    /// Run until shutdown or until every producer has hung up.
    ///
    /// The in-flight event is always carried through routing, execution and
    /// its audit write before the loop exits.
    pub async fn run(
        self,
        mut queue: mpsc::UnboundedReceiver<IntelligenceEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("decision dispatcher started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                polled = tokio::time::timeout(self.poll_interval, queue.recv()) => {
                    match polled {
                        Ok(Some(event)) => self.process(event, &mut shutdown).await,
                        Ok(None) => {
                            info!("all producers gone, dispatcher stopping");
                            break;
                        }
                        Err(_) => self.idle_sweep().await,
                    }
                }
            }
        }
        info!("decision dispatcher stopped");
    }

    /// One event end to end: prompt → reason → parse/fallback → route → act.
    async fn process(&self, event: IntelligenceEvent, shutdown: &mut watch::Receiver<bool>) {
        let prompt = build_event_prompt(&event);
        let decision = self.decide(&prompt, shutdown).await;
        let mode = self.router.route(decision.confidence_score);
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            action = %decision.action_type,
            confidence = decision.confidence_score,
            ?mode,
            "decision routed"
        );
        self.actions.handle(&event, &decision, mode).await;
    }

    /// Invoke the reasoner and turn whatever comes back into a valid
    /// decision. This never fails: unusable responses and exhausted retries
    /// both produce the deterministic fallback.
    async fn decide(&self, prompt: &str, shutdown: &mut watch::Receiver<bool>) -> Decision {
        match self.invoke_with_retry(prompt, shutdown).await {
            Ok(raw) => parse_decision(&raw).unwrap_or_else(|reason| {
                warn!(%reason, "unparseable reasoner response, using fallback decision");
                fallback_decision(&raw, &reason)
            }),
            Err(reason) => {
                warn!(%reason, "reasoner unavailable, using fallback decision");
                fallback_decision("", &reason)
            }
        }
    }

    /// Call the reasoner with a fixed backoff between attempts.
    ///
    /// Individual calls are unbounded in time but cancellable by shutdown,
    /// so a hung reasoner cannot pin the process.
    async fn invoke_with_retry(
        &self,
        prompt: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<String, String> {
        let mut last_error = String::new();
        for attempt in 1..=REASONER_ATTEMPTS {
            tokio::select! {
                result = self.reasoner.invoke(prompt) => match result {
                    Ok(raw) => return Ok(raw),
                    Err(e) => {
                        warn!(attempt, error = %e, "reasoner call failed");
                        last_error = e.to_string();
                        if attempt < REASONER_ATTEMPTS {
                            tokio::time::sleep(self.retry_backoff).await;
                        }
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Err("shutdown interrupted reasoning".into());
                    }
                }
            }
        }
        Err(format!("reasoner call failed after {REASONER_ATTEMPTS} attempts: {last_error}"))
    }

    /// Placeholder for proactive intelligence gathering; for now it only
    /// proves the loop is alive while the queue is empty.
    async fn idle_sweep(&self) {
        debug!("decision queue idle, running sweep");
        append_or_log(
            self.audit.as_ref(),
            AuditRecord::new(AuditKind::Heartbeat, json!({ "note": "idle sweep" })),
        )
        .await;
    }
}
