//! Audit trail boundary.
//!
//! Every successful transition, line mutation, cost mutation, and document
//! event is emitted as an immutable record. The engine only writes here; the
//! history view that reads it back lives outside this workspace.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use portledge_core::{TenantId, UserId};

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub tenant_id: TenantId,
    /// e.g. "purchase_order", "order_line", "forwarding_cost".
    pub entity_type: String,
    pub entity_id: String,
    /// e.g. "stage_advanced", "line_patched", "order_split".
    pub action: String,
    pub old_value: Option<JsonValue>,
    pub new_value: Option<JsonValue>,
    pub actor: UserId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit sink rejected record: {0}")]
    Rejected(String),
}

/// Sink for audit records.
///
/// Implementations must treat records as append-only facts; the engine never
/// updates or deletes what it has emitted.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// In-memory sink for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit sink poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.lock().expect("audit sink poisoned").push(record);
        Ok(())
    }
}
