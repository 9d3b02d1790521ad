//! Per-stream reader task: poll → normalize → forward → ack.
//!
//! One [`StreamReader`] runs per configured source stream. Transient read
//! failures are logged and retried after a fixed backoff; the stream is
//! never abandoned. A message is acknowledged only after the canonical event
//! has been handed to the downstream channel, so a crash between delivery
//! and ack results in redelivery, not loss.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use vantage_core::event::{BusinessContext, IntelligenceEvent};

use crate::consumer::{StreamConsumer, StreamMessage};
use crate::error::StreamError;
use crate::normalizer::Normalizer;

/// Source of ambient business metrics, sampled at normalization time.
pub trait ContextSource: Send + Sync {
    fn snapshot(&self) -> Option<BusinessContext>;
}

/// Context source that always returns nothing.
pub struct NullContextSource;

impl ContextSource for NullContextSource {
    fn snapshot(&self) -> Option<BusinessContext> {
        None
    }
}

/// Context source returning a fixed snapshot.
pub struct StaticContextSource(pub BusinessContext);

impl ContextSource for StaticContextSource {
    fn snapshot(&self) -> Option<BusinessContext> {
        Some(self.0.clone())
    }
}

/// Long-running reader for one source stream.
pub struct StreamReader {
    stream: String,
    consumer: Arc<dyn StreamConsumer>,
    normalizer: Arc<Normalizer>,
    context: Arc<dyn ContextSource>,
    events: mpsc::UnboundedSender<IntelligenceEvent>,
    batch_size: u32,
    poll_wait: Duration,
    retry_backoff: Duration,
}

impl StreamReader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: impl Into<String>,
        consumer: Arc<dyn StreamConsumer>,
        normalizer: Arc<Normalizer>,
        context: Arc<dyn ContextSource>,
        events: mpsc::UnboundedSender<IntelligenceEvent>,
        batch_size: u32,
        poll_wait: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            stream: stream.into(),
            consumer,
            normalizer,
            context,
            events,
            batch_size,
            poll_wait,
            retry_backoff,
        }
    }

    /// Run until the shutdown signal flips. The in-flight batch is always
    /// finished before exit; only the idle poll wait is interruptible.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(stream = %self.stream, "stream reader started");
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
                result = self.consumer.poll_batch(self.batch_size, self.poll_wait) => {
                    match result {
                        Ok(batch) if batch.is_empty() => {}
                        Ok(batch) => {
                            if let Err(StreamError::DownstreamClosed) = self.process_batch(batch).await {
                                info!(stream = %self.stream, "downstream closed, reader stopping");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(stream = %self.stream, error = %e, "stream read failed, backing off");
                            tokio::time::sleep(self.retry_backoff).await;
                        }
                    }
                }
            }
        }
        info!(stream = %self.stream, "stream reader stopped");
    }

    /// Normalize and forward one batch, acking each message only after its
    /// event has been accepted downstream. Dropped messages (below threshold
    /// or malformed) are acked too, since re-reading them changes nothing.
    async fn process_batch(&self, batch: Vec<StreamMessage>) -> Result<(), StreamError> {
        for message in batch {
            match self.normalizer.normalize(&message, self.context.snapshot()) {
                Some(event) => {
                    debug!(
                        stream = %self.stream,
                        event_type = %event.event_type,
                        priority = %event.priority,
                        "normalized event"
                    );
                    if self.events.send(event).is_err() {
                        // Pipeline is gone; put the message back for a
                        // future incarnation of the group.
                        if let Err(e) = self.consumer.nack(&message.receipt_handle).await {
                            warn!(stream = %self.stream, error = %e, "nack failed during shutdown");
                        }
                        return Err(StreamError::DownstreamClosed);
                    }
                    if let Err(e) = self.consumer.ack(&message.receipt_handle).await {
                        warn!(stream = %self.stream, error = %e, "ack failed, message may be redelivered");
                    }
                }
                None => {
                    if let Err(e) = self.consumer.ack(&message.receipt_handle).await {
                        warn!(stream = %self.stream, error = %e, "ack failed for dropped message");
                    }
                }
            }
        }
        Ok(())
    }
}
