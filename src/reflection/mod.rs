//! Self-reflection scoring
//!
//! Grades a report on completeness, depth and accuracy. Pure and
//! deterministic: freshness is measured against `report.created_at`.

use crate::models::{Reflection, Report, Scores, StepName, Verdict};
use chrono::Duration;

/// Results older than this relative to report creation are stale
pub const FRESHNESS_WINDOW_DAYS: i64 = 7;

/// Average score at or above which research stops refining
pub const ACCEPTANCE_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct ReflectionScorer {
    freshness_window: Duration,
}

impl ReflectionScorer {
    pub fn new() -> Self {
        Self {
            freshness_window: Duration::days(FRESHNESS_WINDOW_DAYS),
        }
    }

    pub fn score(&self, report: &Report) -> Reflection {
        let error_free = error_free_rate(report);
        let scores = Scores {
            completeness: error_free,
            depth: self.depth(report),
            accuracy: (self.freshness(report) + error_free) / 2.0,
        };

        let average = scores.average();
        let verdict = Verdict::from_average(average);

        Reflection {
            scores,
            average,
            verdict,
            feedback: format!("Avg {:.2}: {}", average, verdict.label()),
        }
    }

    fn depth(&self, report: &Report) -> f64 {
        let insights = report
            .financial_analysis()
            .map(|analysis| analysis.insights.len())
            .unwrap_or(0);
        let sentiments = report
            .news_digest()
            .map(|digest| digest.distinct_sentiments())
            .unwrap_or(0);
        depth_score(insights, sentiments)
    }

    fn freshness(&self, report: &Report) -> f64 {
        ratio_over_plan(report, |step| {
            report
                .result(step)
                .map(|r| r.is_fresh(report.created_at, self.freshness_window))
                .unwrap_or(false)
        })
    }
}

impl Default for ReflectionScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// min(1, (insights + distinct sentiments) / 2)
pub fn depth_score(insight_count: usize, distinct_sentiments: usize) -> f64 {
    ((insight_count + distinct_sentiments) as f64 / 2.0).min(1.0)
}

fn error_free_rate(report: &Report) -> f64 {
    ratio_over_plan(report, |step| {
        report.result(step).map(|r| !r.is_error()).unwrap_or(false)
    })
}

/// Share of plan entries satisfying `pred`; 0.0 for an empty plan
fn ratio_over_plan(report: &Report, pred: impl Fn(StepName) -> bool) -> f64 {
    if report.plan.is_empty() {
        return 0.0;
    }
    let hits = report.plan.iter().filter(|step| pred(**step)).count();
    hits as f64 / report.plan.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClassifiedArticle, Entities, FinancialAnalysis, Fundamentals, Insight, NewsDigest,
        ResearchPlan, RiskLevel, Sentiment, StepPayload, StepResult,
    };
    use crate::report::assemble;
    use std::collections::BTreeMap;

    fn insight(code: &str) -> Insight {
        Insight {
            code: code.to_string(),
            detail: String::new(),
            risk: false,
        }
    }

    fn financials(insights: Vec<Insight>) -> StepPayload {
        StepPayload::Financials(FinancialAnalysis {
            fundamentals: Fundamentals::default(),
            insights,
            risk_score: 0,
            risk_level: RiskLevel::Low,
        })
    }

    fn news(sentiments: &[Sentiment]) -> StepPayload {
        StepPayload::News(NewsDigest {
            ingested: sentiments.len(),
            raw: Vec::new(),
            items: sentiments
                .iter()
                .map(|s| ClassifiedArticle {
                    title: "t".to_string(),
                    cleaned_summary: String::new(),
                    sentiment: *s,
                    score: 0,
                    entities: Entities::default(),
                })
                .collect(),
            summary: String::new(),
        })
    }

    #[test]
    fn test_empty_plan_scores_zero() {
        let report = assemble(&ResearchPlan::default(), BTreeMap::new(), "AAPL");
        let reflection = ReflectionScorer::new().score(&report);

        assert_eq!(reflection.scores.completeness, 0.0);
        assert_eq!(reflection.scores.accuracy, 0.0);
        assert_eq!(reflection.scores.depth, 0.0);
        assert_eq!(reflection.verdict, Verdict::NeedsRefinement);
        assert!(!reflection.average.is_nan());
    }

    #[test]
    fn test_depth_formula() {
        assert_eq!(depth_score(0, 0), 0.0);
        assert_eq!(depth_score(1, 0), 0.5);
        assert_eq!(depth_score(2, 0), 1.0);
        assert_eq!(depth_score(3, 3), 1.0);

        let mut previous = 0.0;
        for n in 0..6 {
            let d = depth_score(n, 0);
            assert!(d >= previous);
            previous = d;
        }
    }

    #[test]
    fn test_fresh_error_free_single_insight_is_good() {
        let plan = ResearchPlan::new(vec![StepName::Financials, StepName::News]);
        let mut report = assemble(&plan, BTreeMap::new(), "AAPL");
        let now = report.created_at;
        report.results.insert(
            StepName::Financials,
            StepResult::success(financials(vec![insight("high_valuation_risk")]), Some(now)),
        );
        report
            .results
            .insert(StepName::News, StepResult::success(news(&[]), Some(now)));

        let reflection = ReflectionScorer::new().score(&report);
        assert_eq!(reflection.scores.completeness, 1.0);
        assert_eq!(reflection.scores.depth, 0.5);
        assert_eq!(reflection.scores.accuracy, 1.0);
        assert!((reflection.average - 0.8333).abs() < 1e-3);
        assert_eq!(reflection.verdict, Verdict::Good);
        assert_eq!(reflection.feedback, "Avg 0.83: Good");
    }

    #[test]
    fn test_stale_and_errored_steps_lower_accuracy() {
        let plan = ResearchPlan::new(vec![
            StepName::Financials,
            StepName::News,
            StepName::Edgar,
            StepName::Economic,
        ]);
        let mut report = assemble(&plan, BTreeMap::new(), "AAPL");
        let now = report.created_at;
        report.results.insert(
            StepName::Financials,
            StepResult::success(
                financials(vec![insight("a"), insight("b")]),
                Some(now - Duration::days(8)),
            ),
        );
        report.results.insert(
            StepName::News,
            StepResult::success(
                news(&[Sentiment::Positive, Sentiment::Negative]),
                Some(now - Duration::days(1)),
            ),
        );
        report
            .results
            .insert(StepName::Edgar, StepResult::error("offline"));
        // Economic never ran

        let reflection = ReflectionScorer::new().score(&report);
        assert_eq!(reflection.scores.completeness, 0.5);
        assert_eq!(reflection.scores.depth, 1.0);
        // freshness 1/4, error-free 2/4
        assert_eq!(reflection.scores.accuracy, 0.375);
        assert_eq!(reflection.verdict, Verdict::NeedsRefinement);
        assert!(reflection.feedback.contains("Refine: Boost depth"));
    }

    #[test]
    fn test_seven_day_boundary_is_stale() {
        let plan = ResearchPlan::new(vec![StepName::News]);
        let mut report = assemble(&plan, BTreeMap::new(), "AAPL");
        let at_boundary = report.created_at - Duration::days(FRESHNESS_WINDOW_DAYS);
        report
            .results
            .insert(StepName::News, StepResult::success(news(&[]), Some(at_boundary)));

        let reflection = ReflectionScorer::new().score(&report);
        assert_eq!(reflection.scores.accuracy, 0.5);
    }

    #[test]
    fn test_duplicate_plan_entries_count_separately() {
        let plan = ResearchPlan::new(vec![StepName::Economic, StepName::Economic, StepName::News]);
        let mut report = assemble(&plan, BTreeMap::new(), "AAPL");
        report
            .results
            .insert(StepName::News, StepResult::error("offline"));
        report.results.insert(
            StepName::Economic,
            StepResult::success(
                StepPayload::Economic(crate::models::MacroSnapshot {
                    indicator: "GDP".to_string(),
                    values: BTreeMap::new(),
                }),
                None,
            ),
        );

        let reflection = ReflectionScorer::new().score(&report);
        assert!((reflection.scores.completeness - 2.0 / 3.0).abs() < 1e-9);
    }
}
