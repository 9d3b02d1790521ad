//! In-memory stream backend with consumer-group semantics.
//!
//! Stands in for an external stream broker: named append-only streams, one
//! durable cursor per consumer group, and a pending set so unacknowledged
//! deliveries come back with an incremented attempt count (at-least-once).
//! Uses `std::sync::Mutex`; no lock is ever held across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::consumer::{StreamConsumer, StreamHealth, StreamMessage};
use crate::error::StreamError;

struct StoredMessage {
    id: String,
    body: String,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct GroupState {
    /// Index of the next never-delivered message.
    cursor: usize,
    /// Nacked deliveries waiting to go out again: (message index, next attempt).
    redeliver: VecDeque<(usize, u32)>,
    /// In-flight deliveries keyed by receipt handle: (message index, attempt).
    pending: HashMap<String, (usize, u32)>,
}

#[derive(Default)]
struct StreamState {
    messages: Vec<StoredMessage>,
    groups: HashMap<String, GroupState>,
}

/// Hub holding all in-memory streams and their consumer groups.
#[derive(Default)]
pub struct MemoryStreamHub {
    streams: Mutex<HashMap<String, StreamState>>,
    arrivals: Notify,
}

impl MemoryStreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a stream, creating the stream if needed.
    /// Returns the assigned message id.
    pub fn publish(&self, stream: &str, body: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        {
            let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
            let state = streams.entry(stream.to_string()).or_default();
            state.messages.push(StoredMessage {
                id: id.clone(),
                body: body.into(),
                timestamp: Utc::now(),
            });
        }
        self.arrivals.notify_waiters();
        id
    }

    /// Create a consumer group on a stream. Creating a group that already
    /// exists is a no-op, not an error, so startup is restart-safe.
    pub fn create_group(&self, stream: &str, group: &str) {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        let state = streams.entry(stream.to_string()).or_default();
        state.groups.entry(group.to_string()).or_default();
    }

    /// Build a consumer bound to one stream under a named group.
    pub fn consumer(self: &Arc<Self>, stream: &str, group: &str) -> MemoryStreamConsumer {
        self.create_group(stream, group);
        MemoryStreamConsumer {
            hub: Arc::clone(self),
            stream: stream.to_string(),
            group: group.to_string(),
        }
    }

    /// Non-blocking read of up to `max` messages for a group.
    /// Redeliveries are served before never-delivered messages.
    fn try_poll(&self, stream: &str, group: &str, max: u32) -> Vec<StreamMessage> {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        let state = match streams.get_mut(stream) {
            Some(s) => s,
            None => return Vec::new(),
        };
        let total = state.messages.len();
        let group_state = match state.groups.get_mut(group) {
            Some(g) => g,
            None => return Vec::new(),
        };

        let mut out = Vec::new();
        while out.len() < max as usize {
            let (index, attempt) = match group_state.redeliver.pop_front() {
                Some(entry) => entry,
                None if group_state.cursor < total => {
                    let index = group_state.cursor;
                    group_state.cursor += 1;
                    (index, 1)
                }
                None => break,
            };
            let stored = &state.messages[index];
            let receipt = format!("{stream}/{group}/{}", Uuid::new_v4());
            group_state.pending.insert(receipt.clone(), (index, attempt));
            out.push(StreamMessage {
                id: stored.id.clone(),
                stream: stream.to_string(),
                body: stored.body.clone(),
                receipt_handle: receipt,
                timestamp: stored.timestamp,
                attempt_count: attempt,
            });
        }
        out
    }

    fn ack(&self, stream: &str, group: &str, receipt: &str) -> Result<(), StreamError> {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        let group_state = streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
            .ok_or_else(|| StreamError::NotFound(format!("{stream}/{group}")))?;
        group_state
            .pending
            .remove(receipt)
            .map(|_| ())
            .ok_or_else(|| StreamError::Ack(format!("unknown receipt: {receipt}")))
    }

    fn nack(&self, stream: &str, group: &str, receipt: &str) -> Result<(), StreamError> {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        let group_state = streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
            .ok_or_else(|| StreamError::NotFound(format!("{stream}/{group}")))?;
        let (index, attempt) = group_state
            .pending
            .remove(receipt)
            .ok_or_else(|| StreamError::Ack(format!("unknown receipt: {receipt}")))?;
        group_state.redeliver.push_back((index, attempt + 1));
        debug!(stream, group, index, attempt, "message nacked for redelivery");
        Ok(())
    }

    fn backlog(&self, stream: &str, group: &str) -> u64 {
        let streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        streams
            .get(stream)
            .and_then(|s| {
                let total = s.messages.len();
                s.groups
                    .get(group)
                    .map(|g| (total - g.cursor + g.redeliver.len()) as u64)
            })
            .unwrap_or(0)
    }
}

/// A [`StreamConsumer`] bound to one stream and group on a [`MemoryStreamHub`].
pub struct MemoryStreamConsumer {
    hub: Arc<MemoryStreamHub>,
    stream: String,
    group: String,
}

#[async_trait]
impl StreamConsumer for MemoryStreamConsumer {
    async fn poll_batch(
        &self,
        max_messages: u32,
        max_wait: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let batch = self.hub.try_poll(&self.stream, &self.group, max_messages);
            if !batch.is_empty() {
                return Ok(batch);
            }
            // Notify wakeups can race with publish; the loop re-checks.
            let notified = self.hub.arrivals.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), StreamError> {
        self.hub.ack(&self.stream, &self.group, receipt_handle)
    }

    async fn nack(&self, receipt_handle: &str) -> Result<(), StreamError> {
        self.hub.nack(&self.stream, &self.group, receipt_handle)
    }

    async fn health_check(&self) -> Result<StreamHealth, StreamError> {
        Ok(StreamHealth {
            connected: true,
            approximate_backlog: Some(self.hub.backlog(&self.stream, &self.group)),
            provider: "memory".to_string(),
        })
    }
}
