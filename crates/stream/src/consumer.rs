//! Stream consumer trait and message types.
//!
//! A consumer reads one named source stream under a durable consumer-group
//! cursor: restarts resume where the group left off rather than reprocessing
//! or skipping. Delivery is at-least-once: a message is removed from the
//! pending set only when acknowledged, so downstream must tolerate replays.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// A raw message received from a source stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Unique message identifier from the stream provider.
    pub id: String,
    /// Name of the stream this message was read from.
    pub stream: String,
    /// Raw message body (JSON string; schema owned by the source).
    pub body: String,
    /// Provider-specific handle for ack/nack.
    pub receipt_handle: String,
    /// When the message was appended to the stream.
    pub timestamp: DateTime<Utc>,
    /// Number of times this message has been delivered (replay tracking).
    pub attempt_count: u32,
}

/// Health status of a stream connection.
#[derive(Debug, Clone, Serialize)]
pub struct StreamHealth {
    /// Whether the stream is reachable.
    pub connected: bool,
    /// Approximate number of messages not yet read by this group.
    pub approximate_backlog: Option<u64>,
    /// Stream provider name (e.g., "memory", "redis").
    pub provider: String,
}

impl fmt::Display for StreamHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamHealth {{ connected: {}, backlog: {:?}, provider: {} }}",
            self.connected, self.approximate_backlog, self.provider
        )
    }
}

/// Trait for stream consumer backends.
///
/// Implementations handle polling, acknowledging, and redelivery under a
/// named consumer group for a particular provider.
#[async_trait]
pub trait StreamConsumer: Send + Sync {
    /// Poll up to `max_messages`, blocking at most `max_wait` for new data.
    ///
    /// Returns an empty vec if nothing arrives within the wait. Delivered
    /// messages stay pending until [`ack`](StreamConsumer::ack)ed.
    async fn poll_batch(
        &self,
        max_messages: u32,
        max_wait: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Acknowledge successful processing; the message will not be redelivered.
    async fn ack(&self, receipt_handle: &str) -> Result<(), StreamError>;

    /// Negative-acknowledge: return the message for immediate redelivery
    /// with an incremented attempt count.
    async fn nack(&self, receipt_handle: &str) -> Result<(), StreamError>;

    /// Check stream connectivity and return health status.
    async fn health_check(&self) -> Result<StreamHealth, StreamError>;
}
