//! Canonical event types flowing through the intelligence pipeline.
//!
//! Every inbound signal, whatever its source stream, is normalized into an
//! [`IntelligenceEvent`] before anything downstream touches it. Events are
//! value objects: constructed once, never mutated, consumed exactly once by
//! the decision dispatcher.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Closed set of event categories the pipeline understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FinancialAlert,
    CustomerRisk,
    CompetitiveThreat,
    MarketOpportunity,
    TechnicalIssue,
    /// Created by the pattern detector, never by a stream consumer.
    SyntheticPattern,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::FinancialAlert => "financial_alert",
            EventType::CustomerRisk => "customer_risk",
            EventType::CompetitiveThreat => "competitive_threat",
            EventType::MarketOpportunity => "market_opportunity",
            EventType::TechnicalIssue => "technical_issue",
            EventType::SyntheticPattern => "synthetic_pattern",
        };
        write!(f, "{s}")
    }
}

/// Event priority. Present on every event but not used for queue ordering;
/// the dispatcher drains strictly FIFO (known limitation, kept deliberately).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Snapshot of ambient business metrics, captured at normalization time.
///
/// Used only as reasoning input; never updated after the event is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessContext {
    /// Cash on hand, in whole currency units.
    pub cash_balance: f64,
    /// Months of runway at current burn.
    pub runway_months: f64,
    /// Monthly recurring revenue.
    pub mrr: f64,
    /// Monthly churn rate in [0, 1].
    pub churn_rate: f64,
    /// Count of active customers.
    pub active_customers: u64,
}

/// The canonical unit of input for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceEvent {
    /// Unique event id, assigned at construction.
    pub id: Uuid,
    pub event_type: EventType,
    pub priority: Priority,
    /// Name of the origin stream ("finance", "customers", ...) or
    /// "pattern_detector" for synthetic events.
    pub source: String,
    /// Opaque payload; schema is owned by the source, not the pipeline.
    pub data: Value,
    /// Creation instant. Immutable once constructed.
    pub timestamp: DateTime<Utc>,
    /// Optional ambient-metric snapshot, reasoning input only.
    pub context: Option<BusinessContext>,
}

impl IntelligenceEvent {
    /// Build a new event stamped with a fresh id and the current time.
    pub fn new(
        event_type: EventType,
        priority: Priority,
        source: impl Into<String>,
        data: Value,
        context: Option<BusinessContext>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            priority,
            source: source.into(),
            data,
            timestamp: Utc::now(),
            context,
        }
    }

    /// Read a string field from the opaque payload.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Read a numeric field from the opaque payload.
    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }
}
