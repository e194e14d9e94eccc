//! Regulatory filings tool (latest 10-K / 10-Q)

use super::client::DataSource;
use super::snapshot;
use super::Tool;
use crate::models::{FilingSummary, StepName, ToolOutput};
use crate::Result;

pub struct FilingsTool {
    source: DataSource,
}

impl FilingsTool {
    pub fn new(source: DataSource) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl Tool for FilingsTool {
    fn step(&self) -> StepName {
        StepName::Edgar
    }

    fn description(&self) -> &'static str {
        "Metadata and section summaries of the most recent annual or quarterly filing"
    }

    async fn fetch(&self, symbol: &str) -> Result<ToolOutput> {
        let filing: FilingSummary = match &self.source {
            DataSource::Remote(api) => {
                api.get_json(&format!("/api/v1/filings/{}", symbol), &[])
                    .await?
            }
            DataSource::Snapshot => snapshot::filing(symbol),
        };

        Ok(ToolOutput::ok(serde_json::to_value(filing)?))
    }
}
