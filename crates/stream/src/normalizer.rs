//! Source-specific normalization of raw stream messages.
//!
//! Each source stream has a threshold rule deciding whether a raw message is
//! worth the pipeline's attention. Messages that do not cross their source's
//! threshold return `None`: deliberate noise filtering, not an error path.
//! Normalization is a pure function of the message and config, so replayed
//! deliveries produce equivalent events (at-least-once safe).

use serde_json::Value;
use tracing::{debug, warn};

use vantage_core::config::NormalizerConfig;
use vantage_core::event::{BusinessContext, EventType, IntelligenceEvent, Priority};

use crate::consumer::StreamMessage;

/// Converts raw stream messages into canonical [`IntelligenceEvent`]s.
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize one raw message from its source stream.
    ///
    /// Returns `None` for malformed payloads, unknown sources, and messages
    /// below their source's alerting threshold.
    pub fn normalize(
        &self,
        message: &StreamMessage,
        context: Option<BusinessContext>,
    ) -> Option<IntelligenceEvent> {
        let payload: Value = match serde_json::from_str(&message.body) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) => {
                warn!(stream = %message.stream, id = %message.id, "payload is not a JSON object, dropping");
                return None;
            }
            Err(e) => {
                warn!(stream = %message.stream, id = %message.id, error = %e, "unparseable payload, dropping");
                return None;
            }
        };

        let classified = match message.stream.as_str() {
            "finance" => self.classify_financial(&payload),
            "customers" => self.classify_customer(&payload),
            "competitors" => self.classify_competitive(&payload),
            "market" => self.classify_market(&payload),
            "technical" => self.classify_technical(&payload),
            other => {
                warn!(stream = %other, "no normalization rule for source, dropping");
                return None;
            }
        };

        match classified {
            Some((event_type, priority)) => Some(IntelligenceEvent::new(
                event_type,
                priority,
                message.stream.clone(),
                payload,
                context,
            )),
            None => {
                debug!(stream = %message.stream, id = %message.id, "below threshold, dropped");
                None
            }
        }
    }

    /// Financial messages alert only when runway falls below the critical
    /// setting. Runway under half the setting escalates to critical priority.
    fn classify_financial(&self, payload: &Value) -> Option<(EventType, Priority)> {
        let runway = field_f64(payload, "runway_months")?;
        if runway >= self.config.critical_runway_months {
            return None;
        }
        let priority = if runway < self.config.critical_runway_months / 2.0 {
            Priority::Critical
        } else {
            Priority::High
        };
        Some((EventType::FinancialAlert, priority))
    }

    /// Customer messages alert only when the churn-risk score exceeds the
    /// configured threshold.
    fn classify_customer(&self, payload: &Value) -> Option<(EventType, Priority)> {
        let risk = field_f64(payload, "risk_score")?;
        if risk <= self.config.churn_risk_threshold {
            return None;
        }
        let priority = if risk > 0.9 {
            Priority::Critical
        } else {
            Priority::High
        };
        Some((EventType::CustomerRisk, priority))
    }

    fn classify_competitive(&self, payload: &Value) -> Option<(EventType, Priority)> {
        let severity = field_f64(payload, "threat_severity")?;
        if severity <= self.config.threat_severity_threshold {
            return None;
        }
        let priority = if severity > 0.85 {
            Priority::High
        } else {
            Priority::Medium
        };
        Some((EventType::CompetitiveThreat, priority))
    }

    fn classify_market(&self, payload: &Value) -> Option<(EventType, Priority)> {
        let score = field_f64(payload, "opportunity_score")?;
        if score <= self.config.opportunity_score_threshold {
            return None;
        }
        Some((EventType::MarketOpportunity, Priority::Medium))
    }

    fn classify_technical(&self, payload: &Value) -> Option<(EventType, Priority)> {
        let error_rate = field_f64(payload, "error_rate")?;
        if error_rate <= self.config.error_rate_threshold {
            return None;
        }
        let priority = if error_rate > self.config.error_rate_threshold * 4.0 {
            Priority::Critical
        } else {
            Priority::High
        };
        Some((EventType::TechnicalIssue, priority))
    }
}

fn field_f64(payload: &Value, key: &str) -> Option<f64> {
    payload.get(key).and_then(Value::as_f64)
}
