//! Periodic pattern detection over the window cache.
//!
//! On a fixed timer tick, every enabled pattern is evaluated against the
//! cache. A pattern whose matching-event count reaches its threshold fires a
//! synthetic escalation event into the decision queue. Firing does not
//! consume the matched events: a pattern models persistent elevated risk,
//! not a one-shot trigger, so the same events may drive multiple firings
//! until they age out of the window.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use vantage_core::event::{EventType, IntelligenceEvent, Priority};

use crate::config::EventPattern;
use crate::error::PatternError;
use crate::window::WindowCache;

/// Source string stamped on all detector-generated events.
pub const SYNTHETIC_SOURCE: &str = "pattern_detector";

pub struct PatternDetector {
    patterns: Vec<EventPattern>,
    cache: WindowCache,
    output: mpsc::UnboundedSender<IntelligenceEvent>,
}

impl PatternDetector {
    pub fn new(
        patterns: Vec<EventPattern>,
        cache: WindowCache,
        output: mpsc::UnboundedSender<IntelligenceEvent>,
    ) -> Self {
        Self {
            patterns,
            cache,
            output,
        }
    }

    /// Evaluate every enabled pattern once. Returns how many fired.
    ///
    /// A failure evaluating one pattern is logged and never aborts the
    /// remaining patterns in the same tick.
    pub fn tick(&self, now: DateTime<Utc>) -> usize {
        let mut fired = 0;
        for pattern in self.patterns.iter().filter(|p| p.enabled) {
            match self.evaluate(pattern, now) {
                Ok(Some(event)) => {
                    if self.output.send(event).is_err() {
                        info!("decision queue closed, detector tick aborted");
                        return fired;
                    }
                    fired += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(pattern_id = %pattern.pattern_id, error = %e, "pattern evaluation failed");
                }
            }
        }
        fired
    }

    /// Evaluate one pattern; `Some` carries the synthetic event to enqueue.
    fn evaluate(
        &self,
        pattern: &EventPattern,
        now: DateTime<Utc>,
    ) -> Result<Option<IntelligenceEvent>, PatternError> {
        pattern.validate()?;
        let matches = self.cache.query_at(pattern, now);
        debug!(
            pattern_id = %pattern.pattern_id,
            matching = matches.len(),
            threshold = pattern.trigger_threshold,
            "pattern evaluated"
        );
        if matches.len() < pattern.trigger_threshold {
            return Ok(None);
        }
        Ok(Some(synthesize(pattern, matches.len())))
    }

    /// Run the tick loop until shutdown.
    pub async fn run(self, tick_interval: StdDuration, mut shutdown: watch::Receiver<bool>) {
        info!(
            patterns = self.patterns.len(),
            tick_secs = tick_interval.as_secs(),
            "pattern detector started"
        );
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
                _ = tokio::time::sleep(tick_interval) => {
                    let fired = self.tick(Utc::now());
                    if fired > 0 {
                        info!(fired, "patterns fired this tick");
                    }
                }
            }
        }
        info!("pattern detector stopped");
    }
}

/// Build the escalation event for a fired pattern.
fn synthesize(pattern: &EventPattern, matching_count: usize) -> IntelligenceEvent {
    IntelligenceEvent::new(
        EventType::SyntheticPattern,
        Priority::High,
        SYNTHETIC_SOURCE,
        json!({
            "pattern_id": pattern.pattern_id,
            "matching_count": matching_count,
            "severity": matching_count as f64 * pattern.severity_multiplier,
        }),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternConditions;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn pattern(id: &str, threshold: usize, window_secs: u64) -> EventPattern {
        EventPattern {
            pattern_id: id.into(),
            description: None,
            conditions: PatternConditions {
                event_types: vec![EventType::CustomerRisk],
                min_priority: None,
                source: None,
                data_equals: BTreeMap::new(),
            },
            trigger_threshold: threshold,
            time_window_secs: window_secs,
            severity_multiplier: 1.5,
            enabled: true,
        }
    }

    fn risk_event(age_secs: i64) -> IntelligenceEvent {
        let mut e = IntelligenceEvent::new(
            EventType::CustomerRisk,
            Priority::High,
            "customers",
            json!({}),
            None,
        );
        e.timestamp = Utc::now() - Duration::seconds(age_secs);
        e
    }

    fn detector(
        patterns: Vec<EventPattern>,
        cache: WindowCache,
    ) -> (PatternDetector, mpsc::UnboundedReceiver<IntelligenceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PatternDetector::new(patterns, cache, tx), rx)
    }

    #[test]
    fn below_threshold_does_not_fire() {
        let cache = WindowCache::new();
        cache.record(risk_event(10));
        cache.record(risk_event(20));

        let (det, mut rx) = detector(vec![pattern("churn-wave", 3, 3_600)], cache);
        assert_eq!(det.tick(Utc::now()), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn third_event_in_window_fires_exactly_once() {
        let cache = WindowCache::new();
        cache.record(risk_event(10));
        cache.record(risk_event(20));
        cache.record(risk_event(30));

        let (det, mut rx) = detector(vec![pattern("churn-wave", 3, 3_600)], cache);
        assert_eq!(det.tick(Utc::now()), 1);

        let synthetic = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());

        assert_eq!(synthetic.event_type, EventType::SyntheticPattern);
        assert_eq!(synthetic.priority, Priority::High);
        assert_eq!(synthetic.source, SYNTHETIC_SOURCE);
        assert_eq!(synthetic.data_str("pattern_id"), Some("churn-wave"));
        assert_eq!(synthetic.data_f64("matching_count"), Some(3.0));
        assert_eq!(synthetic.data_f64("severity"), Some(4.5));
    }

    #[test]
    fn aged_events_do_not_count() {
        let cache = WindowCache::new();
        cache.record(risk_event(10));
        cache.record(risk_event(20));
        cache.record(risk_event(4_000)); // outside the 3600s window

        let (det, _rx) = detector(vec![pattern("churn-wave", 3, 3_600)], cache);
        assert_eq!(det.tick(Utc::now()), 0);
    }

    #[test]
    fn firing_does_not_consume_events() {
        let cache = WindowCache::new();
        for age in [10, 20, 30] {
            cache.record(risk_event(age));
        }
        let (det, _rx) = detector(vec![pattern("churn-wave", 3, 3_600)], cache);
        // Elevated risk keeps firing on every tick while events remain in window.
        assert_eq!(det.tick(Utc::now()), 1);
        assert_eq!(det.tick(Utc::now()), 1);
    }

    #[test]
    fn one_bad_pattern_does_not_block_the_rest() {
        let cache = WindowCache::new();
        cache.record(risk_event(10));

        let mut broken = pattern("broken", 1, 3_600);
        broken.trigger_threshold = 0; // fails validation at evaluation time
        let ok = pattern("fine", 1, 3_600);

        let (det, mut rx) = detector(vec![broken, ok], cache);
        assert_eq!(det.tick(Utc::now()), 1);
        assert_eq!(rx.try_recv().unwrap().data_str("pattern_id"), Some("fine"));
    }

    #[test]
    fn disabled_patterns_are_skipped() {
        let cache = WindowCache::new();
        cache.record(risk_event(10));

        let mut p = pattern("off", 1, 3_600);
        p.enabled = false;
        let (det, _rx) = detector(vec![p], cache);
        assert_eq!(det.tick(Utc::now()), 0);
    }

    #[tokio::test]
    async fn run_loop_fires_and_shuts_down() {
        let cache = WindowCache::new();
        cache.record(risk_event(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let det = PatternDetector::new(vec![pattern("p", 1, 3_600)], cache, tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(det.run(StdDuration::from_millis(10), shutdown_rx));

        let fired = tokio::time::timeout(StdDuration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.event_type, EventType::SyntheticPattern);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
