//! Research memory
//!
//! Durable mapping from symbol to learned insights, read by the planner and
//! written once at the end of every research run. Also hosts the long-term
//! semantic store used by the narrative synthesizer.

pub mod file;
pub mod in_memory;
pub mod postgres;
pub mod record;
pub mod semantic;

pub use file::JsonFileMemoryStore;
pub use in_memory::InMemoryMemoryStore;
pub use postgres::PgMemoryStore;
pub use record::{MemoryRecord, RunEntry};
pub use semantic::{InMemorySemanticStore, JsonFileSemanticStore, SemanticStore};

use crate::config::ResearchConfig;
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Learned-insight tags with planning or learning semantics
pub mod tags {
    pub const HIGH_RISK: &str = "high_risk";
    pub const HIGH_VOLATILITY: &str = "high_volatility";
    pub const NEGATIVE_SENTIMENT_BIAS: &str = "negative_sentiment_bias";
    pub const EARNINGS_PREVIEW_NEEDED: &str = "earnings_preview_needed";
}

/// Trait for memory persistence.
///
/// `load` on an empty or missing store yields an empty record. `append`
/// folds one finished run into the stored record as a single atomic
/// read-modify-write, so concurrent runs never overwrite each other.
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    async fn load(&self) -> Result<MemoryRecord>;
    async fn save(&self, record: &MemoryRecord) -> Result<()>;
    async fn append(&self, symbol: &str, learned: &[String], at: DateTime<Utc>)
        -> Result<RunEntry>;
}

/// Postgres when a database URL is configured, otherwise a JSON file
pub fn memory_store_from_config(config: &ResearchConfig) -> Result<Arc<dyn MemoryStore>> {
    if let Some(url) = config.database_url.as_deref() {
        info!("Research memory backend: postgres");
        return Ok(Arc::new(PgMemoryStore::connect_lazy(url)?));
    }

    info!(path = %config.memory_path.display(), "Research memory backend: json file");
    Ok(Arc::new(JsonFileMemoryStore::new(config.memory_path.clone())))
}
