//! Research planner
//!
//! Produces the ordered step list for a symbol. The base order is fixed;
//! learned insights from earlier runs insert or reorder steps.

use crate::memory::{tags, MemoryRecord};
use crate::models::{ResearchPlan, StepName};
use tracing::debug;

pub const BASE_PLAN: [StepName; 5] = [
    StepName::Prices,
    StepName::Financials,
    StepName::News,
    StepName::Edgar,
    StepName::Economic,
];

/// Trait for plan generation. Implementations must be pure.
pub trait Planner: Send + Sync {
    fn plan(&self, symbol: &str, memory: &MemoryRecord) -> ResearchPlan;
}

/// Applies memory-driven adjustments to the base plan, in order:
/// volatility insertion, risk-context insertion, earnings-first reordering.
pub struct AdaptivePlanner;

impl Planner for AdaptivePlanner {
    fn plan(&self, symbol: &str, memory: &MemoryRecord) -> ResearchPlan {
        let insights = memory.insights_for(symbol);
        let has = |tag: &str| insights.iter().any(|i| i == tag);

        let mut steps = BASE_PLAN.to_vec();

        if has(tags::HIGH_VOLATILITY) {
            steps.insert(2, StepName::VolatilityAnalysis);
        }

        // duplicate economic entries are kept and re-fetched
        if has(tags::HIGH_RISK) {
            steps.insert(1, StepName::Economic);
        }

        if has(tags::EARNINGS_PREVIEW_NEEDED) {
            steps.retain(|step| *step != StepName::Financials);
            steps.insert(0, StepName::Financials);
        }

        let plan = ResearchPlan::new(steps);
        debug!(symbol, plan = %plan, insight_count = insights.len(), "Plan created");
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(symbol: &str, insights: &[&str]) -> MemoryRecord {
        let mut memory = MemoryRecord::default();
        memory.insights.insert(
            symbol.to_string(),
            insights.iter().map(|s| s.to_string()).collect(),
        );
        memory
    }

    #[test]
    fn test_no_memory_gives_base_plan() {
        let plan = AdaptivePlanner.plan("AAPL", &MemoryRecord::default());
        assert_eq!(plan.steps(), &BASE_PLAN);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn test_high_risk_puts_economic_second() {
        let plan = AdaptivePlanner.plan("AAPL", &memory_with("AAPL", &["high_risk"]));
        assert_eq!(plan.steps()[1], StepName::Economic);
        assert_eq!(
            plan.steps().iter().filter(|s| **s == StepName::Economic).count(),
            2
        );
        assert_eq!(plan.len(), 6);
    }

    #[test]
    fn test_high_risk_with_other_insights_keeps_economic_second() {
        let memory = memory_with(
            "AAPL",
            &["negative_sentiment_bias", "high_volatility", "high_risk", "high_risk"],
        );
        let plan = AdaptivePlanner.plan("AAPL", &memory);
        assert_eq!(plan.steps()[1], StepName::Economic);
    }

    #[test]
    fn test_high_volatility_inserts_analysis_after_financials() {
        let plan = AdaptivePlanner.plan("TSLA", &memory_with("TSLA", &["high_volatility"]));
        assert_eq!(
            plan.steps(),
            &[
                StepName::Prices,
                StepName::Financials,
                StepName::VolatilityAnalysis,
                StepName::News,
                StepName::Edgar,
                StepName::Economic,
            ]
        );
    }

    #[test]
    fn test_earnings_preview_moves_financials_first() {
        let plan = AdaptivePlanner.plan(
            "AAPL",
            &memory_with("AAPL", &["earnings_preview_needed"]),
        );
        assert_eq!(
            plan.steps(),
            &[
                StepName::Financials,
                StepName::Prices,
                StepName::News,
                StepName::Edgar,
                StepName::Economic,
            ]
        );
    }

    #[test]
    fn test_all_adjustments_compose_in_order() {
        let memory = memory_with(
            "AAPL",
            &["high_volatility", "high_risk", "earnings_preview_needed"],
        );
        let plan = AdaptivePlanner.plan("AAPL", &memory);
        assert_eq!(
            plan.steps(),
            &[
                StepName::Financials,
                StepName::Prices,
                StepName::Economic,
                StepName::VolatilityAnalysis,
                StepName::News,
                StepName::Edgar,
                StepName::Economic,
            ]
        );
        assert_eq!(plan.steps()[0], StepName::Financials);
    }

    #[test]
    fn test_other_symbols_memory_is_ignored() {
        let plan = AdaptivePlanner.plan("MSFT", &memory_with("AAPL", &["high_risk"]));
        assert_eq!(plan.steps(), &BASE_PLAN);
    }
}
