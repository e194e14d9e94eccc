//! Price, fundamentals, macro and volatility tools

use super::client::DataSource;
use super::snapshot;
use super::Tool;
use crate::insights::InsightEngine;
use crate::models::{
    Fundamentals, MacroSnapshot, PriceSeries, StepName, ToolOutput, VolatilityReport,
};
use crate::Result;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Close-price standard deviation above which a symbol counts as volatile
pub const HIGH_VOLATILITY_STD_DEV: f64 = 10.0;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

async fn load_prices(source: &DataSource, symbol: &str) -> Result<PriceSeries> {
    match source {
        DataSource::Remote(api) => {
            api.get_json(
                &format!("/api/v1/prices/{}", symbol),
                &[("period", "1y".to_string())],
            )
            .await
        }
        DataSource::Snapshot => Ok(snapshot::prices(symbol)),
    }
}

pub struct PricesTool {
    source: DataSource,
}

impl PricesTool {
    pub fn new(source: DataSource) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl Tool for PricesTool {
    fn step(&self) -> StepName {
        StepName::Prices
    }

    fn description(&self) -> &'static str {
        "One year of daily closing prices"
    }

    async fn fetch(&self, symbol: &str) -> Result<ToolOutput> {
        let series = load_prices(&self.source, symbol).await?;
        Ok(ToolOutput::ok(serde_json::to_value(series)?))
    }
}

pub struct FinancialsTool {
    source: DataSource,
    engine: InsightEngine,
}

impl FinancialsTool {
    pub fn new(source: DataSource, engine: InsightEngine) -> Self {
        Self { source, engine }
    }
}

#[async_trait::async_trait]
impl Tool for FinancialsTool {
    fn step(&self) -> StepName {
        StepName::Financials
    }

    fn description(&self) -> &'static str {
        "Fundamentals evaluated by the insight rules"
    }

    async fn fetch(&self, symbol: &str) -> Result<ToolOutput> {
        let fundamentals: Fundamentals = match &self.source {
            DataSource::Remote(api) => {
                api.get_json(&format!("/api/v1/fundamentals/{}", symbol), &[])
                    .await?
            }
            DataSource::Snapshot => snapshot::fundamentals(),
        };

        let analysis = self.engine.analyze(symbol, fundamentals);
        Ok(ToolOutput::ok(serde_json::to_value(analysis)?))
    }
}

#[derive(Debug, Deserialize)]
struct MacroResponse {
    values: BTreeMap<String, Value>,
}

pub struct EconomicTool {
    source: DataSource,
    indicator: String,
}

impl EconomicTool {
    pub fn new(source: DataSource, indicator: &str) -> Self {
        Self {
            source,
            indicator: indicator.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for EconomicTool {
    fn step(&self) -> StepName {
        StepName::Economic
    }

    fn description(&self) -> &'static str {
        "Latest release of a macroeconomic indicator"
    }

    /// Macro data is market-wide; the symbol is not part of the request
    async fn fetch(&self, _symbol: &str) -> Result<ToolOutput> {
        let values = match &self.source {
            DataSource::Remote(api) => {
                let response: MacroResponse = api
                    .get_json(&format!("/api/v1/macro/{}", self.indicator), &[])
                    .await?;
                response.values
            }
            DataSource::Snapshot => snapshot::macro_values(&self.indicator),
        };

        let snapshot = MacroSnapshot {
            indicator: self.indicator.clone(),
            values,
        };
        Ok(ToolOutput::ok(serde_json::to_value(snapshot)?))
    }
}

pub struct VolatilityTool {
    source: DataSource,
}

impl VolatilityTool {
    pub fn new(source: DataSource) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl Tool for VolatilityTool {
    fn step(&self) -> StepName {
        StepName::VolatilityAnalysis
    }

    fn description(&self) -> &'static str {
        "Dispersion of closing prices and annualized volatility of daily returns"
    }

    async fn fetch(&self, symbol: &str) -> Result<ToolOutput> {
        let series = load_prices(&self.source, symbol).await?;
        Ok(ToolOutput::ok(serde_json::to_value(analyze_volatility(&series))?))
    }
}

pub fn analyze_volatility(series: &PriceSeries) -> VolatilityReport {
    let close_std_dev = series.close_std_dev().unwrap_or(0.0);

    let mut points = series.points.clone();
    points.sort_by(|a, b| a.date.cmp(&b.date));

    let returns: Vec<f64> = points
        .windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect();

    let annualized_volatility = (returns.len() >= 2).then(|| {
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
    });

    VolatilityReport {
        symbol: series.symbol.clone(),
        observations: series.points.len(),
        close_std_dev,
        annualized_volatility,
        high_volatility: close_std_dev > HIGH_VOLATILITY_STD_DEV,
    }
}
