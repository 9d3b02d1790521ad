//! Intake fan-out: normalized events → window cache + decision queue.
//!
//! Stream readers produce onto a single intake channel; this task records
//! each event into the window cache (for pattern detection) and forwards it
//! to the decision queue. Per-stream ordering is preserved because readers
//! send in read order and this loop forwards one at a time.

use tokio::sync::{mpsc, watch};
use tracing::info;

use vantage_core::event::IntelligenceEvent;
use vantage_pattern::window::WindowCache;

/// Run until the shutdown signal flips or all producers hang up.
pub async fn run_intake(
    mut intake: mpsc::UnboundedReceiver<IntelligenceEvent>,
    cache: WindowCache,
    queue: mpsc::UnboundedSender<IntelligenceEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("intake fan-out started");
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
            next = intake.recv() => {
                match next {
                    Some(event) => {
                        cache.record(event.clone());
                        if queue.send(event).is_err() {
                            info!("decision queue closed, intake stopping");
                            break;
                        }
                    }
                    None => {
                        info!("all stream readers gone, intake stopping");
                        break;
                    }
                }
            }
        }
    }
    info!("intake fan-out stopped");
}
