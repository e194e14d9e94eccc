//! In-memory memory store for development and tests

use super::{MemoryRecord, MemoryStore, RunEntry};
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryMemoryStore {
    record: Arc<RwLock<MemoryRecord>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::with_record(MemoryRecord::default())
    }

    pub fn with_record(record: MemoryRecord) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
        }
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn load(&self) -> Result<MemoryRecord> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, record: &MemoryRecord) -> Result<()> {
        let mut stored = self.record.write().await;
        *stored = record.clone();
        Ok(())
    }

    async fn append(
        &self,
        symbol: &str,
        learned: &[String],
        at: DateTime<Utc>,
    ) -> Result<RunEntry> {
        let mut stored = self.record.write().await;
        Ok(stored.absorb(symbol, learned, at))
    }
}
