pub mod actions;
pub mod audit;
pub mod dispatcher;
pub mod error;
pub mod intake;
pub mod router;

pub use actions::{ActionDispatcher, Advisory, AlertRecord, ExecutionOutcome, PlanOutcome};
pub use audit::{AuditKind, AuditRecord, AuditSink, FailingAuditSink, MemoryAuditSink};
pub use dispatcher::DecisionDispatcher;
pub use error::PipelineError;
pub use intake::run_intake;
pub use router::{ConfidenceRouter, ExecutionMode};
