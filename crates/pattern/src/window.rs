//! Time-bounded window cache of recent canonical events.
//!
//! Stream readers write, the pattern detector reads, and a background sweep
//! deletes, so the container is `Arc<RwLock<...>>` and safe to clone across
//! tasks. Correctness never depends on eviction timing: every query
//! re-checks entry age against the pattern's own window, so an entry past
//! its window is invisible even while still physically present.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, info};

use vantage_core::event::IntelligenceEvent;

use crate::config::EventPattern;

/// Shared, self-evicting store of `(timestamp, event)` pairs.
#[derive(Clone, Default)]
pub struct WindowCache {
    entries: Arc<RwLock<VecDeque<(DateTime<Utc>, IntelligenceEvent)>>>,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event under its creation timestamp.
    ///
    /// Duplicates (replayed deliveries) are stored as-is; pattern queries
    /// tolerate them by design.
    pub fn record(&self, event: IntelligenceEvent) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push_back((event.timestamp, event));
    }

    /// Events matching a pattern's conditions within its time window of `now`.
    ///
    /// Age is always re-checked here; physical eviction is advisory cleanup
    /// only.
    pub fn query_at(&self, pattern: &EventPattern, now: DateTime<Utc>) -> Vec<IntelligenceEvent> {
        let cutoff = now - pattern.time_window();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|(ts, event)| *ts > cutoff && pattern.conditions.matches(event))
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// [`query_at`](Self::query_at) against the current instant.
    pub fn query(&self, pattern: &EventPattern) -> Vec<IntelligenceEvent> {
        self.query_at(pattern, Utc::now())
    }

    /// Drop entries older than `horizon`. Returns how many were removed.
    pub fn evict_older_than(&self, horizon: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(ts, _)| *ts > horizon);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Background sweep: every `interval`, drop entries older than
    /// `retention` (the max time window across all configured patterns).
    pub async fn run_eviction(
        self,
        interval: StdDuration,
        retention: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(retention_secs = retention.num_seconds(), "eviction sweep started");
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
                _ = tokio::time::sleep(interval) => {
                    let removed = self.evict_older_than(Utc::now() - retention);
                    if removed > 0 {
                        debug!(removed, remaining = self.len(), "evicted aged window entries");
                    }
                }
            }
        }
        info!("eviction sweep stopped");
    }
}
