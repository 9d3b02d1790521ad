//! End-to-end tests over the full task graph: memory streams → readers →
//! intake → (window cache, decision queue) → detector → dispatcher →
//! registry → audit sink.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde_json::json;
use tokio::sync::{mpsc, watch};

use vantage_core::config::{NormalizerConfig, RoutingConfig};
use vantage_core::event::{EventType, IntelligenceEvent, Priority};
use vantage_pattern::config::{EventPattern, PatternConditions};
use vantage_pattern::detector::PatternDetector;
use vantage_pattern::window::WindowCache;
use vantage_pipeline::actions::ActionDispatcher;
use vantage_pipeline::audit::{AuditKind, AuditSink, FailingAuditSink, MemoryAuditSink};
use vantage_pipeline::dispatcher::DecisionDispatcher;
use vantage_pipeline::intake::run_intake;
use vantage_pipeline::router::ConfidenceRouter;
use vantage_reasoner::provider::{Reasoner, ScriptedReasoner};
use vantage_stream::consumer::StreamConsumer;
use vantage_stream::memory::MemoryStreamHub;
use vantage_stream::normalizer::Normalizer;
use vantage_stream::reader::{NullContextSource, StreamReader};
use vantage_tools::action::ActionCategory;
use vantage_tools::handlers::StubTool;
use vantage_tools::registry::ToolRegistry;

const CONFIDENT: &str = r#"{"action_type":"send_retention_offer","parameters":{},
    "reasoning":"high churn risk","confidence_score":0.92,
    "expected_impact":"retain customer","urgency_level":"high"}"#;

fn normalizer() -> Arc<Normalizer> {
    Arc::new(Normalizer::new(NormalizerConfig {
        critical_runway_months: 3.0,
        churn_risk_threshold: 0.7,
        threat_severity_threshold: 0.6,
        opportunity_score_threshold: 0.7,
        error_rate_threshold: 0.05,
    }))
}

fn router() -> ConfidenceRouter {
    ConfidenceRouter::from_config(&RoutingConfig {
        autonomous_threshold: 0.8,
        advisory_threshold: 0.5,
        success_rate_threshold: 0.7,
    })
    .unwrap()
}

fn registry() -> ToolRegistry {
    let mut r = ToolRegistry::new();
    r.register(StubTool::succeeding(
        "send_retention_offer",
        ActionCategory::Customer,
    ))
    .unwrap();
    r
}

fn dispatcher(reasoner: Arc<dyn Reasoner>, audit: Arc<dyn AuditSink>) -> DecisionDispatcher {
    let actions = ActionDispatcher::new(
        Arc::new(registry()),
        Arc::clone(&audit),
        0.7,
        ChronoDuration::hours(24),
    );
    DecisionDispatcher::new(
        reasoner,
        router(),
        actions,
        audit,
        Duration::from_millis(50),
        Duration::from_millis(1),
    )
}

fn risk_event() -> IntelligenceEvent {
    IntelligenceEvent::new(
        EventType::CustomerRisk,
        Priority::High,
        "customers",
        json!({"risk_score": 0.9}),
        None,
    )
}

async fn wait_until(audit: &MemoryAuditSink, kind: AuditKind, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if audit.records_of(kind).len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("audit records did not appear in time");
}

#[tokio::test]
async fn stream_message_flows_to_autonomous_execution() {
    let hub = Arc::new(MemoryStreamHub::new());
    let cache = WindowCache::new();
    let audit = Arc::new(MemoryAuditSink::new());
    let (intake_tx, intake_rx) = mpsc::unbounded_channel();
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reader = StreamReader::new(
        "customers",
        Arc::new(hub.consumer("customers", "g1")),
        normalizer(),
        Arc::new(NullContextSource),
        intake_tx,
        10,
        Duration::from_millis(20),
        Duration::from_millis(5),
    );
    let mut tasks = vec![
        tokio::spawn(reader.run(shutdown_rx.clone())),
        tokio::spawn(run_intake(
            intake_rx,
            cache.clone(),
            queue_tx,
            shutdown_rx.clone(),
        )),
        tokio::spawn(
            dispatcher(
                Arc::new(ScriptedReasoner::new([CONFIDENT])),
                Arc::clone(&audit) as Arc<dyn AuditSink>,
            )
            .run(queue_rx, shutdown_rx),
        ),
    ];

    hub.publish("customers", r#"{"risk_score": 0.95, "customer_id": "C-7"}"#);
    hub.publish("customers", r#"{"risk_score": 0.1}"#); // filtered out

    wait_until(&audit, AuditKind::Execution, 1).await;

    shutdown_tx.send(true).unwrap();
    for task in tasks.drain(..) {
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    // Only the above-threshold message became a decision; the cache saw it too.
    assert_eq!(audit.records_of(AuditKind::Execution).len(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn detector_escalation_reaches_the_dispatcher() {
    let cache = WindowCache::new();
    let audit = Arc::new(MemoryAuditSink::new());
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pattern = EventPattern {
        pattern_id: "churn-wave".into(),
        description: None,
        conditions: PatternConditions {
            event_types: vec![EventType::CustomerRisk],
            min_priority: Some(Priority::High),
            source: None,
            data_equals: BTreeMap::new(),
        },
        trigger_threshold: 2,
        time_window_secs: 3_600,
        severity_multiplier: 1.5,
        enabled: true,
    };

    cache.record(risk_event());
    cache.record(risk_event());

    let detector = PatternDetector::new(vec![pattern], cache.clone(), queue_tx);
    let mut tasks = vec![
        tokio::spawn(detector.run(Duration::from_millis(10), shutdown_rx.clone())),
        tokio::spawn(
            dispatcher(
                Arc::new(ScriptedReasoner::new([CONFIDENT])),
                Arc::clone(&audit) as Arc<dyn AuditSink>,
            )
            .run(queue_rx, shutdown_rx),
        ),
    ];

    wait_until(&audit, AuditKind::Execution, 1).await;

    shutdown_tx.send(true).unwrap();
    for task in tasks.drain(..) {
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn replayed_delivery_leaves_cache_usable() {
    // Simulate at-least-once delivery: read, nack, read again; both
    // deliveries flow through normalization into the cache.
    let hub = Arc::new(MemoryStreamHub::new());
    let consumer = hub.consumer("customers", "g1");
    hub.publish("customers", r#"{"risk_score": 0.9}"#);

    let normalizer = normalizer();
    let cache = WindowCache::new();

    let first = consumer
        .poll_batch(10, Duration::from_millis(10))
        .await
        .unwrap();
    cache.record(normalizer.normalize(&first[0], None).unwrap());
    consumer.nack(&first[0].receipt_handle).await.unwrap();

    let second = consumer
        .poll_batch(10, Duration::from_millis(10))
        .await
        .unwrap();
    cache.record(normalizer.normalize(&second[0], None).unwrap());
    consumer.ack(&second[0].receipt_handle).await.unwrap();

    // Duplicate entry is present and pattern matching tolerates it.
    assert_eq!(cache.len(), 2);
    let pattern = EventPattern {
        pattern_id: "dup-tolerant".into(),
        description: None,
        conditions: PatternConditions {
            event_types: vec![EventType::CustomerRisk],
            min_priority: None,
            source: None,
            data_equals: BTreeMap::new(),
        },
        trigger_threshold: 1,
        time_window_secs: 3_600,
        severity_multiplier: 1.0,
        enabled: true,
    };
    assert_eq!(cache.query(&pattern).len(), 2);
}

#[tokio::test]
async fn pipeline_survives_permanently_failing_audit_sink() {
    // 100 consecutive events with every audit append failing: the
    // dispatcher must drain the whole queue without deadlock or crash.
    let audit: Arc<dyn AuditSink> = Arc::new(FailingAuditSink);
    let d = dispatcher(Arc::new(ScriptedReasoner::new([CONFIDENT])), audit);

    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    for _ in 0..100 {
        queue_tx.send(risk_event()).unwrap();
    }
    drop(queue_tx); // run() returns once the queue is drained

    tokio::time::timeout(Duration::from_secs(10), d.run(queue_rx, shutdown_rx))
        .await
        .expect("dispatcher stalled with failing audit sink");
}
