//! Append-only audit log for security-relevant decisions.
//!
//! Rejections (and any future privileged action) append one record
//! each. The production backing store is a JSON-lines file under the
//! wallet directory; tests use the in-memory variant.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use host_types::{HostError, HostResult};

/// Which surface made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorSurface {
    Agent,
    Extension,
    Host,
}

/// One audit entry. Records are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    /// Event name, e.g. `reject`.
    pub event: String,
    /// Subject identifier (transaction ID).
    pub subject: String,
    pub reason: String,
    pub actor: ActorSurface,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn reject(subject: &str, reason: &str, actor: ActorSurface) -> Self {
        Self {
            id: format!("audit-{}", Uuid::new_v4()),
            event: "reject".to_string(),
            subject: subject.to_string(),
            reason: reason.to_string(),
            actor,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only sink for audit records.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Persist the record and return its ID.
    async fn append(&self, record: AuditRecord) -> HostResult<String>;
}

/// JSON-lines file, one record per line, flushed per append.
pub struct JsonlAuditLog {
    path: PathBuf,
    // Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn append(&self, record: AuditRecord) -> HostResult<String> {
        let line = serde_json::to_string(&record).map_err(|e| {
            HostError::internal(format!("cannot serialize audit record: {e}"))
        })?;
        let id = record.id;

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HostError::internal(format!("cannot open audit log: {e}")))?;
        writeln!(file, "{line}")
            .and_then(|()| file.flush())
            .map_err(|e| HostError::internal(format!("cannot append audit record: {e}")))?;

        Ok(id)
    }
}

/// Test double retaining records in memory.
#[derive(Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, record: AuditRecord) -> HostResult<String> {
        let id = record.id.clone();
        self.records.lock().push(record);
        Ok(id)
    }
}
