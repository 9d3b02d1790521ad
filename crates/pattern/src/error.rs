//! Pattern crate error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pattern '{pattern_id}': {reason}")]
    InvalidPattern { pattern_id: String, reason: String },

    #[error("duplicate pattern id: {0}")]
    DuplicateId(String),

    #[error("downstream closed")]
    DownstreamClosed,
}
