//! vantage-worker: the event intelligence pipeline process.
//!
//! Wires together and runs, as independent tasks:
//! - one stream reader per configured source (memory backend)
//! - the intake fan-out into window cache + decision queue
//! - the pattern detector tick loop
//! - the window cache eviction sweep
//! - the decision dispatcher
//!
//! SIGINT triggers a graceful shutdown: every task finishes its in-flight
//! item and exits; nothing is killed mid-audit-write.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vantage_core::config::{load_dotenv, Config};
use vantage_pattern::config::max_time_window;
use vantage_pattern::detector::PatternDetector;
use vantage_pattern::loader::load_patterns;
use vantage_pattern::window::WindowCache;
use vantage_pipeline::actions::ActionDispatcher;
use vantage_pipeline::audit::{AuditSink, MemoryAuditSink};
use vantage_pipeline::dispatcher::DecisionDispatcher;
use vantage_pipeline::intake::run_intake;
use vantage_pipeline::router::ConfidenceRouter;
use vantage_reasoner::openai::OpenAiReasoner;
use vantage_reasoner::provider::{Reasoner, ReasonerError, ScriptedReasoner};
use vantage_stream::memory::MemoryStreamHub;
use vantage_stream::normalizer::Normalizer;
use vantage_stream::reader::{NullContextSource, StreamReader};

// ── CLI ─────────────────────────────────────────────────────────────

/// Vantage event intelligence worker.
#[derive(Parser, Debug)]
#[command(name = "vantage-worker", version, about)]
struct Cli {
    /// Path to the YAML pattern definition file (overrides env).
    #[arg(long, env = "VANTAGE_PATTERNS_PATH")]
    patterns: Option<String>,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "VANTAGE_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.patterns {
        config.pipeline.patterns_path = path;
    }
    config.validate().context("invalid configuration")?;

    let patterns = load_patterns(&config.pipeline.patterns_path)
        .with_context(|| format!("loading patterns from {}", config.pipeline.patterns_path))?;
    let retention = max_time_window(&patterns);

    // Shared state.
    let hub = Arc::new(MemoryStreamHub::new());
    let cache = WindowCache::new();
    let audit: Arc<MemoryAuditSink> = Arc::new(MemoryAuditSink::new());
    let registry = Arc::new(
        vantage_tools::handlers::builtin_registry().context("building action registry")?,
    );

    let reasoner: Arc<dyn Reasoner> = match OpenAiReasoner::from_config(&config.reasoner) {
        Ok(provider) => Arc::new(provider),
        Err(ReasonerError::NotConfigured(key)) => {
            warn!(%key, "no reasoner credentials, falling back to scripted monitor decisions");
            Arc::new(ScriptedReasoner::new([
                r#"{"action_type":"monitor_and_report","parameters":{},"reasoning":"no reasoner configured","confidence_score":0.3,"expected_impact":"none","urgency_level":"low"}"#,
            ]))
        }
        Err(e) => return Err(e).context("building reasoner"),
    };

    // Channels: readers → intake → decision queue ← detector.
    let (intake_tx, intake_rx) = mpsc::unbounded_channel();
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();

    let normalizer = Arc::new(Normalizer::new(config.normalizer.clone()));
    for stream in &config.streams.names {
        let reader = StreamReader::new(
            stream.clone(),
            Arc::new(hub.consumer(stream, &config.streams.group)),
            Arc::clone(&normalizer),
            Arc::new(NullContextSource),
            intake_tx.clone(),
            config.streams.batch_size,
            Duration::from_millis(config.streams.poll_wait_ms),
            Duration::from_millis(config.streams.retry_backoff_ms),
        );
        tasks.push(tokio::spawn(reader.run(shutdown_rx.clone())));
    }
    drop(intake_tx);

    tasks.push(tokio::spawn(run_intake(
        intake_rx,
        cache.clone(),
        queue_tx.clone(),
        shutdown_rx.clone(),
    )));

    let detector = PatternDetector::new(patterns, cache.clone(), queue_tx);
    tasks.push(tokio::spawn(detector.run(
        Duration::from_secs(config.pipeline.detector_tick_secs),
        shutdown_rx.clone(),
    )));

    tasks.push(tokio::spawn(cache.clone().run_eviction(
        Duration::from_secs(config.pipeline.eviction_sweep_secs),
        retention,
        shutdown_rx.clone(),
    )));

    let router = ConfidenceRouter::from_config(&config.routing)?;
    let actions = ActionDispatcher::new(
        registry,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
        config.routing.success_rate_threshold,
        chrono::Duration::hours(config.pipeline.advisory_expiry_hours as i64),
    );
    let dispatcher = DecisionDispatcher::new(
        reasoner,
        router,
        actions,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
        Duration::from_secs(config.pipeline.dispatcher_poll_secs),
        Duration::from_millis(config.streams.retry_backoff_ms),
    );
    tasks.push(tokio::spawn(dispatcher.run(queue_rx, shutdown_rx)));

    info!(
        streams = config.streams.names.len(),
        group = %config.streams.group,
        "vantage worker running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received, draining tasks");
    let _ = shutdown_tx.send(true);

    let drain = async {
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "task join failed");
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(cli.shutdown_timeout), drain)
        .await
        .is_err()
    {
        warn!("shutdown timeout elapsed, exiting with tasks still running");
    }

    info!(audit_records = audit.len(), "vantage worker stopped");
    Ok(())
}
