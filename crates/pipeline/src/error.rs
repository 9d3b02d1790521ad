//! Pipeline error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] vantage_core::error::VantageError),

    #[error("audit sink error: {0}")]
    Audit(String),

    #[error("decision queue closed")]
    QueueClosed,
}
