//! Audit log of finished research reports
//!
//! Every report is stored with a SHA-256 fingerprint taken at record time.
//! The log is bounded; once full, the oldest record is evicted.

use crate::models::Report;
use crate::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Records kept before the oldest is evicted
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub report: Arc<Report>,
    pub fingerprint: String,
    pub recorded_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

#[derive(Default)]
struct AuditEntries {
    by_id: HashMap<Uuid, AuditRecord>,
    order: VecDeque<Uuid>,
}

/// Audit trail storage
pub struct AuditLog {
    records: Arc<RwLock<AuditEntries>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Log holding at most `capacity` records (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(AuditEntries::default())),
            capacity: capacity.max(1),
        }
    }

    /// Store a finished report, returning its id
    pub async fn record(&self, report: Report, execution_time_ms: u64) -> Result<Uuid> {
        let report_id = report.report_id;
        let record = AuditRecord {
            fingerprint: compute_report_hash(&report),
            report: Arc::new(report),
            recorded_at: Utc::now(),
            execution_time_ms,
        };

        let mut records = self.records.write().await;
        if records.by_id.insert(report_id, record).is_none() {
            records.order.push_back(report_id);
        }

        while records.order.len() > self.capacity {
            if let Some(evicted) = records.order.pop_front() {
                records.by_id.remove(&evicted);
                debug!(report_id = %evicted, capacity = self.capacity, "Audit record evicted");
            }
        }

        Ok(report_id)
    }

    pub async fn get(&self, report_id: Uuid) -> Result<Option<AuditRecord>> {
        let records = self.records.read().await;
        Ok(records.by_id.get(&report_id).cloned())
    }

    /// Report ids for a symbol, oldest first
    pub async fn list_for_symbol(&self, symbol: &str) -> Result<Vec<Uuid>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .by_id
            .iter()
            .filter(|(_, record)| record.report.symbol.eq_ignore_ascii_case(symbol))
            .map(|(id, record)| (*id, record.report.created_at))
            .collect();

        items.sort_by_key(|(_, created_at)| *created_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Verify a record's integrity via hash
    pub async fn verify_integrity(&self, report_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        if let Some(record) = records.by_id.get(&report_id) {
            Ok(compute_report_hash(&record.report) == record.fingerprint)
        } else {
            Ok(false)
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute SHA256 hash of a report for integrity verification
/// Uses streaming serialization into the hasher
pub fn compute_report_hash(report: &Report) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), report).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
