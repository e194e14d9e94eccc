//! Long-term semantic store for finished analyses

use crate::error::ResearchError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Trait for a document store queried by relevance
#[async_trait::async_trait]
pub trait SemanticStore: Send + Sync {
    async fn add(&self, id: &str, text: &str, metadata: BTreeMap<String, String>) -> Result<()>;

    /// Up to `k` stored texts, most relevant first
    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>>;
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Ranks documents by the number of distinct lowercase terms they share
/// with the query. Documents sharing no term are never returned.
fn rank(documents: &[StoredDocument], text: &str, k: usize) -> Vec<String> {
    let query_terms = terms(text);

    let mut ranked: Vec<(usize, usize, &StoredDocument)> = documents
        .iter()
        .enumerate()
        .map(|(index, doc)| (terms(&doc.text).intersection(&query_terms).count(), index, doc))
        .filter(|(overlap, _, _)| *overlap > 0)
        .collect();

    // most overlap first, newest first on ties
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    ranked
        .into_iter()
        .take(k)
        .map(|(_, _, doc)| doc.text.clone())
        .collect()
}

fn upsert(
    documents: &mut Vec<StoredDocument>,
    id: &str,
    text: &str,
    metadata: BTreeMap<String, String>,
) {
    documents.retain(|d| d.id != id);
    documents.push(StoredDocument {
        id: id.to_string(),
        text: text.to_string(),
        metadata,
    });
}

// ================= In-memory =================

#[derive(Default)]
pub struct InMemorySemanticStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl InMemorySemanticStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait::async_trait]
impl SemanticStore for InMemorySemanticStore {
    async fn add(&self, id: &str, text: &str, metadata: BTreeMap<String, String>) -> Result<()> {
        let mut documents = self.documents.write().await;
        upsert(&mut documents, id, text, metadata);
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>> {
        let documents = self.documents.read().await;
        Ok(rank(&documents, text, k))
    }
}

// ================= JSON file =================

/// Keeps every analysis in one JSON array so past conclusions survive
/// restarts. Writes go through a sibling temp file and a rename.
pub struct JsonFileSemanticStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSemanticStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_documents(&self) -> Result<Vec<StoredDocument>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            ResearchError::MemoryError(format!(
                "Corrupt analysis store {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn write_documents(&self, documents: &[StoredDocument]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "agent_analyses.json".into());
        name.push(".tmp");
        let temp = self.path.with_file_name(name);

        tokio::fs::write(&temp, serde_json::to_string_pretty(documents)?).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SemanticStore for JsonFileSemanticStore {
    async fn add(&self, id: &str, text: &str, metadata: BTreeMap<String, String>) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut documents = self.read_documents().await?;
        upsert(&mut documents, id, text, metadata);
        self.write_documents(&documents).await?;

        debug!(path = %self.path.display(), id, documents = documents.len(), "Analysis stored");
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let documents = self.read_documents().await?;
        Ok(rank(&documents, text, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_ranks_by_overlap() {
        let store = InMemorySemanticStore::new();
        store
            .add("AAPL_1", "Apple analysis: Hold on valuation risk", BTreeMap::new())
            .await
            .unwrap();
        store
            .add("TSLA_1", "Tesla deliveries analysis", BTreeMap::new())
            .await
            .unwrap();

        let hits = store
            .query("What was my past analysis and conclusion for Apple?", 1)
            .await
            .unwrap();
        assert_eq!(hits, vec!["Apple analysis: Hold on valuation risk".to_string()]);
    }

    #[tokio::test]
    async fn test_unrelated_query_returns_nothing() {
        let store = InMemorySemanticStore::new();
        store.add("X_1", "bond yields", BTreeMap::new()).await.unwrap();

        assert!(store.query("semiconductors", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let store = InMemorySemanticStore::new();
        store.add("A", "first", BTreeMap::new()).await.unwrap();
        store.add("A", "second", BTreeMap::new()).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyses").join("store.json");

        let mut metadata = BTreeMap::new();
        metadata.insert("symbol".to_string(), "AAPL".to_string());
        JsonFileSemanticStore::new(path.clone())
            .add("AAPL_1", "AAPL analysis: Hold on valuation risk", metadata)
            .await
            .unwrap();

        let reopened = JsonFileSemanticStore::new(path);
        let hits = reopened
            .query("What was my past analysis and conclusion for AAPL?", 1)
            .await
            .unwrap();
        assert_eq!(hits, vec!["AAPL analysis: Hold on valuation risk".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_and_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileSemanticStore::new(path.clone());
        assert!(store.query("anything at all", 3).await.unwrap().is_empty());

        std::fs::write(&path, "[{broken").unwrap();
        let result = store.query("anything at all", 3).await;
        assert!(matches!(result, Err(ResearchError::MemoryError(_))));
    }
}
