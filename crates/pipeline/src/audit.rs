//! Audit trail sink.
//!
//! Append is fire-and-forget: a sink failure is logged and swallowed,
//! because losing an audit record must never block the decision/action
//! path. The bundled in-memory sink caps its history with FIFO eviction so
//! long-running workers stay bounded.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::PipelineError;

/// What a record describes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Autonomous execution: the decision plus every step result.
    Execution,
    /// A time-boxed recommendation awaiting human approval.
    Advisory,
    /// Monitoring-only record for low-confidence decisions.
    Alert,
    /// Dispatcher idle-sweep liveness marker.
    Heartbeat,
}

/// One durable audit entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<Uuid>,
    pub payload: Value,
}

impl AuditRecord {
    pub fn new(kind: AuditKind, payload: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            event_id: None,
            decision_id: None,
            payload,
        }
    }

    pub fn for_decision(kind: AuditKind, event_id: Uuid, decision_id: Uuid, payload: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            event_id: Some(event_id),
            decision_id: Some(decision_id),
            payload,
        }
    }
}

/// Durable store for decisions, action results, and business events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), PipelineError>;
}

/// Append a record, logging and swallowing any sink failure.
pub async fn append_or_log(sink: &dyn AuditSink, record: AuditRecord) {
    let kind = record.kind;
    if let Err(e) = sink.append(record).await {
        warn!(?kind, error = %e, "audit append failed, continuing");
    }
}

/// In-memory audit sink with a capped, FIFO-evicted history.
pub struct MemoryAuditSink {
    records: Arc<RwLock<VecDeque<AuditRecord>>>,
    max_records: usize,
}

impl MemoryAuditSink {
    /// Default cap of 1000 records.
    pub fn new() -> Self {
        Self::with_max_records(1_000)
    }

    pub fn with_max_records(max: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::new())),
            max_records: max,
        }
    }

    /// Snapshot of all retained records, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Retained records of one kind.
    pub fn records_of(&self, kind: AuditKind) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), PipelineError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}

/// Test sink whose append always fails.
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn append(&self, _record: AuditRecord) -> Result<(), PipelineError> {
        Err(PipelineError::Audit("sink unavailable".into()))
    }
}
