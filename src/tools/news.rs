//! Company news tool

use super::client::DataSource;
use super::snapshot;
use super::Tool;
use crate::models::{RawArticle, StepName, ToolOutput};
use crate::news::NewsPipeline;
use crate::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct NewsResponse {
    articles: Vec<RawArticle>,
}

pub struct NewsTool {
    source: DataSource,
    pipeline: NewsPipeline,
    limit: usize,
}

impl NewsTool {
    pub fn new(source: DataSource, pipeline: NewsPipeline, limit: usize) -> Self {
        Self {
            source,
            pipeline,
            limit,
        }
    }
}

#[async_trait::async_trait]
impl Tool for NewsTool {
    fn step(&self) -> StepName {
        StepName::News
    }

    fn description(&self) -> &'static str {
        "Recent headlines run through the news normalization pipeline"
    }

    async fn fetch(&self, symbol: &str) -> Result<ToolOutput> {
        let mut articles = match &self.source {
            DataSource::Remote(api) => {
                let response: NewsResponse = api
                    .get_json(
                        &format!("/api/v1/news/{}", symbol),
                        &[("limit", self.limit.to_string())],
                    )
                    .await?;
                response.articles
            }
            DataSource::Snapshot => snapshot::articles(),
        };
        articles.truncate(self.limit);

        let digest = self.pipeline.process(&symbol.to_uppercase(), articles);
        Ok(ToolOutput::ok(serde_json::to_value(digest)?))
    }
}
