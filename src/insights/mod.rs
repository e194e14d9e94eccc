//! Financial insight rules
//!
//! Rules-based evaluation of fundamentals.
//! Deterministic, no I/O.

use crate::models::{FinancialAnalysis, Fundamentals, Insight, RiskLevel};
use std::collections::HashMap;
use tracing::debug;

/// P/E above this is flagged as a valuation risk
const HIGH_PE_THRESHOLD: f64 = 30.0;

/// Trailing revenue (in billions) considered strong
const STRONG_REVENUE_BILLIONS: f64 = 100.0;

/// Trait for insight rules
pub trait InsightRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, symbol: &str, fundamentals: &Fundamentals) -> Option<Insight>;
}

/// Runs every registered rule and derives the risk score
pub struct InsightEngine {
    rules: Vec<Box<dyn InsightRule>>,
}

impl InsightEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn InsightRule>) {
        self.rules.push(rule);
    }

    pub fn analyze(&self, symbol: &str, fundamentals: Fundamentals) -> FinancialAnalysis {
        let mut fired = Vec::new();
        let mut insights = Vec::new();
        for rule in &self.rules {
            if let Some(insight) = rule.evaluate(symbol, &fundamentals) {
                fired.push(rule.name());
                insights.push(insight);
            }
        }

        let risk_score = insights.iter().filter(|i| i.risk).count() as u32;

        debug!(
            symbol,
            rule_count = self.rules.len(),
            fired = ?fired,
            risk_score,
            "Insight rules evaluated"
        );

        FinancialAnalysis {
            fundamentals,
            insights,
            risk_score,
            risk_level: RiskLevel::from_risk_score(risk_score),
        }
    }
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

//
// ========== Rules ==========
//

pub struct HighValuationRule;

impl InsightRule for HighValuationRule {
    fn name(&self) -> &'static str {
        "high_valuation"
    }

    fn evaluate(&self, _symbol: &str, fundamentals: &Fundamentals) -> Option<Insight> {
        (fundamentals.pe_ratio > HIGH_PE_THRESHOLD).then(|| Insight {
            code: "high_valuation_risk".to_string(),
            detail: format!(
                "PE {:.2} above historical avg of {:.0}",
                fundamentals.pe_ratio, HIGH_PE_THRESHOLD
            ),
            risk: true,
        })
    }
}

pub struct StrongRevenueRule;

impl InsightRule for StrongRevenueRule {
    fn name(&self) -> &'static str {
        "strong_revenue"
    }

    fn evaluate(&self, _symbol: &str, fundamentals: &Fundamentals) -> Option<Insight> {
        let billions = fundamentals.revenue / 1e9;
        (billions > STRONG_REVENUE_BILLIONS).then(|| Insight {
            code: "strong_revenue".to_string(),
            detail: format!("TTM revenue ${:.1}B", billions),
            risk: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EarningsPreview {
    pub date: String,
    pub eps_forecast: f64,
    /// Billions
    pub revenue_forecast: f64,
}

/// Emits the upcoming earnings preview for symbols on the calendar
pub struct EarningsPreviewRule {
    calendar: HashMap<String, EarningsPreview>,
}

impl EarningsPreviewRule {
    pub fn new(calendar: HashMap<String, EarningsPreview>) -> Self {
        Self { calendar }
    }

    pub fn with_default_calendar() -> Self {
        let mut calendar = HashMap::new();
        calendar.insert(
            "AAPL".to_string(),
            EarningsPreview {
                date: "2025-10-30".to_string(),
                eps_forecast: 1.74,
                revenue_forecast: 101.72,
            },
        );
        Self::new(calendar)
    }
}

impl InsightRule for EarningsPreviewRule {
    fn name(&self) -> &'static str {
        "earnings_preview"
    }

    fn evaluate(&self, symbol: &str, _fundamentals: &Fundamentals) -> Option<Insight> {
        let preview = self.calendar.get(&symbol.to_uppercase())?;
        Some(Insight {
            code: "earnings_preview".to_string(),
            detail: format!(
                "{}, EPS ${}, Rev ${}B",
                preview.date, preview.eps_forecast, preview.revenue_forecast
            ),
            risk: false,
        })
    }
}

/// Create an insight engine with the standard rule set
pub fn create_default_insight_engine() -> InsightEngine {
    let mut engine = InsightEngine::new();
    engine.add_rule(Box::new(HighValuationRule));
    engine.add_rule(Box::new(StrongRevenueRule));
    engine.add_rule(Box::new(EarningsPreviewRule::with_default_calendar()));
    engine
}
