//! Tool trait and registry
//!
//! Each research step maps to exactly one data tool. Tools fetch and
//! normalize; they make no decisions. The registry is the dispatcher: it
//! never returns an error, every fault becomes an error-bearing output.

use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::insights::create_default_insight_engine;
use crate::models::{StepName, ToolOutput};
use crate::news::NewsPipeline;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod client;
pub mod filings;
pub mod market;
pub mod news;
pub mod snapshot;

pub use client::{DataSource, MarketDataClient};
pub use filings::FilingsTool;
pub use market::{EconomicTool, FinancialsTool, PricesTool, VolatilityTool};
pub use news::NewsTool;

/// Trait for a single data tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn step(&self) -> StepName;
    fn description(&self) -> &'static str;
    async fn fetch(&self, symbol: &str) -> Result<ToolOutput>;
}

/// Tool registry for looking up and dispatching tools
pub struct ToolRegistry {
    tools: HashMap<StepName, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            timeout,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(step = %tool.step(), description = tool.description(), "Tool registered");
        self.tools.insert(tool.step(), tool);
    }

    pub fn get(&self, step: StepName) -> Option<Arc<dyn Tool>> {
        self.tools.get(&step).cloned()
    }

    pub fn list(&self) -> Vec<StepName> {
        let mut steps: Vec<StepName> = self.tools.keys().copied().collect();
        steps.sort();
        steps
    }

    /// Run the tool for `step`, normalizing every failure into the output
    pub async fn dispatch(&self, step: StepName, symbol: &str) -> ToolOutput {
        let Some(tool) = self.get(step) else {
            warn!(step = %step, symbol, "Tool not registered");
            return ToolOutput::failed(ResearchError::ToolNotFound(step.to_string()).to_string());
        };

        match tokio::time::timeout(self.timeout, tool.fetch(symbol)).await {
            Ok(Ok(output)) => {
                debug!(step = %step, symbol, success = output.success, "Tool dispatched");
                output
            }
            Ok(Err(e)) => {
                warn!(step = %step, symbol, error = %e, "Tool execution failed");
                ToolOutput::failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    step = %step,
                    symbol,
                    timeout_secs = self.timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolOutput::failed(
                    ResearchError::Timeout(format!(
                        "{} did not finish within {}s",
                        step,
                        self.timeout.as_secs()
                    ))
                    .to_string(),
                )
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_FETCH_TIMEOUT_SECS))
    }
}

/// Create a registry with every research tool.
///
/// Tools read from the market-data gateway when one is configured and from
/// the bundled snapshot otherwise.
pub fn create_default_registry(config: &ResearchConfig) -> Result<ToolRegistry> {
    let source = match config.market_data_base_url.as_deref() {
        Some(base_url) => DataSource::Remote(MarketDataClient::new(base_url, config.fetch_timeout)?),
        None => DataSource::Snapshot,
    };

    debug!(source = source.label(), "Building tool registry");

    let mut registry = ToolRegistry::new(config.fetch_timeout);
    registry.register(Arc::new(PricesTool::new(source.clone())));
    registry.register(Arc::new(FinancialsTool::new(
        source.clone(),
        create_default_insight_engine(),
    )));
    registry.register(Arc::new(NewsTool::new(
        source.clone(),
        NewsPipeline::default(),
        config.news_limit,
    )));
    registry.register(Arc::new(FilingsTool::new(source.clone())));
    registry.register(Arc::new(EconomicTool::new(source.clone(), "GDP")));
    registry.register(Arc::new(VolatilityTool::new(source)));

    Ok(registry)
}
