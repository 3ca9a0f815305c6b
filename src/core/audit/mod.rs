//! Append-only audit trail of state transitions.
//!
//! Every accepted transition produces one record with before/after document
//! snapshots. Recording is best-effort: a sink failure is logged for later
//! reconciliation and never surfaces to the caller.

use crate::core::entities::ActorId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Entity kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Assignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: String,
    pub entity: EntityKind,
    pub entity_id: String,
    pub actor: ActorId,
    pub before: Value,
    pub after: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action: impl Into<String>,
        entity: EntityKind,
        entity_id: impl ToString,
        actor: ActorId,
        before: Value,
        after: Value,
    ) -> Self {
        Self {
            action: action.into(),
            entity,
            entity_id: entity_id.to_string(),
            actor,
            before,
            after,
            recorded_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Collects records in memory, in arrival order. Backs tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit lock poisoned").clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.action).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .map_err(|_| AuditError::Unavailable("audit lock poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}
