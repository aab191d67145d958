//! Audit trail contracts and built-in sinks.
//!
//! # Responsibility
//! - Describe one transaction verb invocation as an `AuditEntry`.
//! - Hand each entry to an injectable `AuditSink` as soon as it is produced.
//!
//! # Invariants
//! - Exactly one entry is produced per verb invocation.
//! - The context never retains entries; retention is a sink decision.
//! - Sinks are synchronous and must not fail the calling verb.

use crate::model::delta::Delta;
use crate::model::record::RecordId;
use log::info;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Transaction verb recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditOperation {
    #[serde(rename = "commit")]
    Commit,
    #[serde(rename = "rollback")]
    Rollback,
    #[serde(rename = "get delta")]
    GetDelta,
    #[serde(rename = "clone")]
    Clone,
}

impl AuditOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::GetDelta => "get delta",
            Self::Clone => "clone",
        }
    }
}

impl Display for AuditOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: RecordId,
    /// Unix epoch milliseconds at the time the verb started.
    pub timestamp_ms: i64,
    pub operation: AuditOperation,
    /// Delta contents as seen by the verb.
    pub delta: Delta,
}

impl AuditEntry {
    /// Builds an entry stamped with the current wall-clock time.
    pub fn now(id: RecordId, operation: AuditOperation, delta: Delta) -> Self {
        Self {
            id,
            timestamp_ms: now_epoch_ms(),
            operation,
            delta,
        }
    }
}

/// Consumer of audit entries.
///
/// Called after the context has released its state lock, before listeners
/// fire; implementations may read through handles of the same context.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Default sink: one structured `info` line per entry via the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, entry: &AuditEntry) {
        info!(
            "event=txn_audit module=audit op={} id={} ts_ms={} delta={}",
            entry.operation.as_str().replace(' ', "_"),
            entry.id,
            entry.timestamp_ms,
            entry.delta.to_json_string()
        );
    }
}

/// Sink that drops every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _entry: &AuditEntry) {}
}

/// Sink that retains entries in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every retained entry.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    /// Returns retained operations in arrival order.
    pub fn operations(&self) -> Vec<AuditOperation> {
        self.lock().iter().map(|entry| entry.operation).collect()
    }

    /// Removes and returns every retained entry.
    pub fn take(&self) -> Vec<AuditEntry> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) {
        self.lock().push(entry.clone());
    }
}

fn now_epoch_ms() -> i64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}
