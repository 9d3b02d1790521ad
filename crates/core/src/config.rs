//! Environment-based configuration.
//!
//! All knobs are env vars with defaults so the worker runs out of the box.
//! Call [`load_dotenv`] once at startup, then [`Config::from_env`].

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::VantageError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub streams: StreamConfig,
    pub normalizer: NormalizerConfig,
    pub routing: RoutingConfig,
    pub pipeline: PipelineConfig,
    pub reasoner: ReasonerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            streams: StreamConfig::from_env(),
            normalizer: NormalizerConfig::from_env(),
            routing: RoutingConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
            reasoner: ReasonerConfig::from_env(),
        }
    }

    /// Validate cross-field invariants. Returns the first violation found.
    pub fn validate(&self) -> Result<(), VantageError> {
        self.routing.validate()?;
        self.pipeline.validate()?;
        if self.streams.names.is_empty() {
            return Err(VantageError::InvalidConfig(
                "at least one stream name is required".into(),
            ));
        }
        Ok(())
    }
}

// ── Streams ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Source stream names, one reader task each.
    pub names: Vec<String>,
    /// Consumer-group name; fixed per deployment so restarts resume the cursor.
    pub group: String,
    /// Bounded wait for new messages per poll, in milliseconds.
    pub poll_wait_ms: u64,
    /// Fixed backoff after a transient read failure, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Max messages per poll batch.
    pub batch_size: u32,
}

impl StreamConfig {
    pub fn from_env() -> Self {
        let names = env_or(
            "VANTAGE_STREAMS",
            "finance,customers,competitors,market,technical",
        )
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
        Self {
            names,
            group: env_or("VANTAGE_CONSUMER_GROUP", "vantage-intelligence"),
            poll_wait_ms: env_u64("VANTAGE_POLL_WAIT_MS", 1_000),
            retry_backoff_ms: env_u64("VANTAGE_RETRY_BACKOFF_MS", 2_000),
            batch_size: env_u32("VANTAGE_BATCH_SIZE", 10),
        }
    }
}

// ── Normalizer thresholds ───────────────────────────────────────────

/// Per-source thresholds below/above which raw messages become events.
/// Messages that do not cross their source's threshold are dropped silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Financial messages alert when runway drops below this many months.
    pub critical_runway_months: f64,
    /// Customer messages alert when risk score exceeds this value.
    pub churn_risk_threshold: f64,
    /// Competitor messages alert when threat severity exceeds this value.
    pub threat_severity_threshold: f64,
    /// Market messages alert when opportunity score exceeds this value.
    pub opportunity_score_threshold: f64,
    /// Technical messages alert when error rate exceeds this value.
    pub error_rate_threshold: f64,
}

impl NormalizerConfig {
    pub fn from_env() -> Self {
        Self {
            critical_runway_months: env_f64("VANTAGE_CRITICAL_RUNWAY_MONTHS", 3.0),
            churn_risk_threshold: env_f64("VANTAGE_CHURN_RISK_THRESHOLD", 0.7),
            threat_severity_threshold: env_f64("VANTAGE_THREAT_SEVERITY_THRESHOLD", 0.6),
            opportunity_score_threshold: env_f64("VANTAGE_OPPORTUNITY_SCORE_THRESHOLD", 0.7),
            error_rate_threshold: env_f64("VANTAGE_ERROR_RATE_THRESHOLD", 0.05),
        }
    }
}

// ── Confidence routing ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Decisions at or above this score execute autonomously.
    pub autonomous_threshold: f64,
    /// Decisions at or above this score (but below autonomous) become advisories.
    pub advisory_threshold: f64,
    /// Fraction of plan steps that must succeed for the plan to succeed.
    pub success_rate_threshold: f64,
}

impl RoutingConfig {
    pub fn from_env() -> Self {
        Self {
            autonomous_threshold: env_f64("VANTAGE_AUTONOMOUS_THRESHOLD", 0.8),
            advisory_threshold: env_f64("VANTAGE_ADVISORY_THRESHOLD", 0.5),
            success_rate_threshold: env_f64("VANTAGE_SUCCESS_RATE_THRESHOLD", 0.7),
        }
    }

    /// Enforce `0 <= advisory < autonomous <= 1`.
    pub fn validate(&self) -> Result<(), VantageError> {
        if !(0.0..=1.0).contains(&self.advisory_threshold)
            || !(0.0..=1.0).contains(&self.autonomous_threshold)
            || self.advisory_threshold >= self.autonomous_threshold
        {
            return Err(VantageError::InvalidConfig(format!(
                "confidence thresholds must satisfy 0 <= advisory ({}) < autonomous ({}) <= 1",
                self.advisory_threshold, self.autonomous_threshold
            )));
        }
        if !(self.success_rate_threshold > 0.0 && self.success_rate_threshold <= 1.0) {
            return Err(VantageError::InvalidConfig(format!(
                "success_rate_threshold must be in (0, 1], got {}",
                self.success_rate_threshold
            )));
        }
        Ok(())
    }
}

// ── Pipeline timing ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Dispatcher idle-poll interval in seconds; a sweep heartbeat fires when
    /// the queue stays empty this long.
    pub dispatcher_poll_secs: u64,
    /// Pattern detector tick interval in seconds.
    pub detector_tick_secs: u64,
    /// Window cache eviction sweep interval in seconds.
    pub eviction_sweep_secs: u64,
    /// How long an advisory recommendation remains valid, in hours.
    pub advisory_expiry_hours: u64,
    /// Path to the YAML pattern definition file.
    pub patterns_path: String,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            dispatcher_poll_secs: env_u64("VANTAGE_DISPATCHER_POLL_SECS", 30),
            detector_tick_secs: env_u64("VANTAGE_DETECTOR_TICK_SECS", 60),
            eviction_sweep_secs: env_u64("VANTAGE_EVICTION_SWEEP_SECS", 300),
            advisory_expiry_hours: env_u64("VANTAGE_ADVISORY_EXPIRY_HOURS", 24),
            patterns_path: env_or("VANTAGE_PATTERNS_PATH", "config/patterns.yml"),
        }
    }

    pub fn validate(&self) -> Result<(), VantageError> {
        for (name, v) in [
            ("dispatcher_poll_secs", self.dispatcher_poll_secs),
            ("detector_tick_secs", self.detector_tick_secs),
            ("eviction_sweep_secs", self.eviction_sweep_secs),
        ] {
            if v == 0 {
                return Err(VantageError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

// ── Reasoner ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ReasonerConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt("VANTAGE_REASONER_API_KEY"),
            model: env_or("VANTAGE_REASONER_MODEL", "gpt-4o-mini"),
            base_url: env_or("VANTAGE_REASONER_BASE_URL", "https://api.openai.com"),
            temperature: env_f64("VANTAGE_REASONER_TEMPERATURE", 0.2) as f32,
            max_tokens: env_u32("VANTAGE_REASONER_MAX_TOKENS", 1_024),
        }
    }
}
