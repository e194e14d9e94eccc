//! Postgres memory store
//!
//! Insights are stored one row per (symbol, position) so saving is an
//! append: rows that already exist are left alone. `append` takes a
//! transaction-scoped advisory lock on the symbol before choosing positions.

use super::{tags, MemoryRecord, MemoryStore, RunEntry};
use crate::error::ResearchError;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

pub struct PgMemoryStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgMemoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Build a pool without connecting; the first query opens the connection
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| {
                ResearchError::DatabaseError(format!("Invalid research memory database URL: {}", e))
            })?;
        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS research_insights (
                      symbol TEXT NOT NULL,
                      position INTEGER NOT NULL,
                      tag TEXT NOT NULL,
                      PRIMARY KEY (symbol, position)
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS research_runs (
                      run_id UUID PRIMARY KEY,
                      symbol TEXT NOT NULL,
                      ran_at TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                ResearchError::DatabaseError(format!(
                    "Failed to initialize research memory schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl MemoryStore for PgMemoryStore {
    async fn load(&self) -> Result<MemoryRecord> {
        self.ensure_schema().await?;

        let mut record = MemoryRecord::default();

        let rows = sqlx::query(
            "SELECT symbol, tag FROM research_insights ORDER BY symbol, position",
        )
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let symbol: String = row.try_get("symbol")?;
            let tag: String = row.try_get("tag")?;
            record.insights.entry(symbol).or_default().push(tag);
        }

        let rows = sqlx::query("SELECT run_id, symbol, ran_at FROM research_runs ORDER BY ran_at")
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let run_id: Uuid = row.try_get("run_id")?;
            let symbol: String = row.try_get("symbol")?;
            let timestamp: DateTime<Utc> = row.try_get("ran_at")?;
            record.runs.push(RunEntry {
                run_id,
                symbol,
                timestamp,
            });
        }

        debug!(
            symbols = record.insights.len(),
            runs = record.runs.len(),
            "Memory loaded from postgres"
        );
        Ok(record)
    }

    async fn save(&self, record: &MemoryRecord) -> Result<()> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;

        for (symbol, insights) in &record.insights {
            for (position, tag) in insights.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO research_insights (symbol, position, tag)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (symbol, position) DO NOTHING
                    "#,
                )
                .bind(symbol)
                .bind(position as i32)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
            }
        }

        for run in &record.runs {
            sqlx::query(
                r#"
                INSERT INTO research_runs (run_id, symbol, ran_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (run_id) DO NOTHING
                "#,
            )
            .bind(run.run_id)
            .bind(&run.symbol)
            .bind(run.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append(
        &self,
        symbol: &str,
        learned: &[String],
        at: DateTime<Utc>,
    ) -> Result<RunEntry> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(symbol)
            .execute(&mut *tx)
            .await?;

        let existing: Vec<String> = sqlx::query(
            "SELECT tag FROM research_insights WHERE symbol = $1 ORDER BY position",
        )
        .bind(symbol)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.try_get("tag"))
        .collect::<std::result::Result<_, _>>()?;

        let mut record = MemoryRecord::default();
        record.insights.insert(symbol.to_string(), existing.clone());
        let run = record.absorb(symbol, learned, at);

        let insights = record.insights_for(symbol);
        for (position, tag) in insights.iter().enumerate().skip(existing.len()) {
            sqlx::query(
                "INSERT INTO research_insights (symbol, position, tag) VALUES ($1, $2, $3)",
            )
            .bind(symbol)
            .bind(position as i32)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO research_runs (run_id, symbol, ran_at) VALUES ($1, $2, $3)")
            .bind(run.run_id)
            .bind(&run.symbol)
            .bind(run.timestamp)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            symbol,
            added = insights.len() - existing.len(),
            sentinel = record.has_insight(symbol, tags::EARNINGS_PREVIEW_NEEDED),
            "Memory appended in postgres"
        );
        Ok(run)
    }
}
