//! Stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("message parse error: {0}")]
    Parse(String),

    #[error("acknowledge error: {0}")]
    Ack(String),

    #[error("stream not found: {0}")]
    NotFound(String),

    #[error("downstream closed")]
    DownstreamClosed,

    #[error("provider error: {0}")]
    Provider(String),
}
