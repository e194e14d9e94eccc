//! JSON file memory store

use super::{MemoryRecord, MemoryStore, RunEntry};
use crate::error::ResearchError;
use crate::Result;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Stores the whole record as one pretty-printed JSON document.
///
/// Writes go to a sibling temp file first and are renamed into place.
/// `append` holds `write_lock` across load, absorb and save.
pub struct JsonFileMemoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileMemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "agent_memory.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl MemoryStore for JsonFileMemoryStore {
    async fn load(&self) -> Result<MemoryRecord> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No memory file yet");
                return Ok(MemoryRecord::default());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            warn!(path = %self.path.display(), "Memory file is empty");
            return Ok(MemoryRecord::default());
        }

        serde_json::from_str(&contents).map_err(|e| {
            ResearchError::MemoryError(format!(
                "Corrupt memory file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn save(&self, record: &MemoryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(record)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            symbols = record.insights.len(),
            runs = record.runs.len(),
            "Memory saved"
        );
        Ok(())
    }

    async fn append(
        &self,
        symbol: &str,
        learned: &[String],
        at: DateTime<Utc>,
    ) -> Result<RunEntry> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.load().await?;
        let run = record.absorb(symbol, learned, at);
        self.save(&record).await?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileMemoryStore::new(dir.path().join("absent.json"));

        let record = store.load().await.unwrap();
        assert_eq!(record, MemoryRecord::default());
    }

    #[tokio::test]
    async fn test_empty_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "  \n").unwrap();

        let record = JsonFileMemoryStore::new(path).load().await.unwrap();
        assert!(record.insights.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileMemoryStore::new(path).load().await;
        assert!(matches!(result, Err(ResearchError::MemoryError(_))));
    }

    #[tokio::test]
    async fn test_saved_insights_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileMemoryStore::new(dir.path().join("nested").join("memory.json"));

        let mut record = store.load().await.unwrap();
        record.absorb("AAPL", &["high_risk".to_string()], Utc::now());
        store.save(&record).await.unwrap();

        let mut reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, record);

        reloaded.absorb("AAPL", &["negative_sentiment_bias".to_string()], Utc::now());
        store.save(&reloaded).await.unwrap();

        let last = store.load().await.unwrap();
        let insights = last.insights_for("AAPL");
        assert!(insights.starts_with(record.insights_for("AAPL")));
        assert_eq!(
            insights
                .iter()
                .filter(|i| *i == "earnings_preview_needed")
                .count(),
            1
        );
        assert_eq!(last.runs.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_for_different_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileMemoryStore::new(dir.path().join("memory.json")));

        let aapl_insights = ["high_risk".to_string()];
        let msft_insights = ["high_volatility".to_string()];
        let (a, b) = tokio::join!(
            store.append("AAPL", &aapl_insights, Utc::now()),
            store.append("MSFT", &msft_insights, Utc::now()),
        );
        a.unwrap();
        b.unwrap();

        let record = store.load().await.unwrap();
        assert!(record.has_insight("AAPL", "high_risk"));
        assert!(record.has_insight("MSFT", "high_volatility"));
        assert_eq!(record.runs.len(), 2);
    }
}
