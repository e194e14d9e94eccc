//! Market-data gateway client

use crate::error::ResearchError;
use crate::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the market-data REST gateway (connection-pooled)
#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                ResearchError::ToolError(format!(
                    "Market data request failed for {}: {}",
                    path, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::ToolError(format!(
                "Market data gateway returned {} for {}: {}",
                status, path, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ResearchError::ToolError(format!("Invalid JSON response for {}: {}", path, e)))
    }
}

/// Where tools read their data from
#[derive(Clone)]
pub enum DataSource {
    Remote(MarketDataClient),
    /// Bundled offline dataset, used when no gateway is configured
    Snapshot,
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::Remote(_) => "remote",
            DataSource::Snapshot => "snapshot",
        }
    }
}
