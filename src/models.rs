//! Core data models for the research agent

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Steps & Plan =================
//

/// Closed vocabulary of research steps a plan may contain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Prices,
    Financials,
    News,
    Edgar,
    Economic,
    VolatilityAnalysis,
}

impl StepName {
    pub const ALL: [StepName; 6] = [
        StepName::Prices,
        StepName::Financials,
        StepName::News,
        StepName::Edgar,
        StepName::Economic,
        StepName::VolatilityAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Prices => "prices",
            StepName::Financials => "financials",
            StepName::News => "news",
            StepName::Edgar => "edgar",
            StepName::Economic => "economic",
            StepName::VolatilityAnalysis => "volatility_analysis",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepName::ALL
            .iter()
            .find(|step| step.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown research step: {}", s))
    }
}

/// Ordered list of steps. Duplicates are allowed and executed twice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ResearchPlan {
    steps: Vec<StepName>,
}

impl ResearchPlan {
    pub fn new(steps: Vec<StepName>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepName] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, step: StepName) -> bool {
        self.steps.contains(&step)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepName> {
        self.steps.iter()
    }
}

impl fmt::Display for ResearchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(StepName::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

//
// ================= Tool I/O =================
//

/// Raw output of a data tool, before validation at the executor boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
    pub timestamp: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
            timestamp: None,
        }
    }
}

//
// ================= Step Payloads =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    #[serde(default)]
    pub period: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Population standard deviation of closing prices
    pub fn close_std_dev(&self) -> Option<f64> {
        let closes = self.closes();
        if closes.is_empty() {
            return None;
        }
        let n = closes.len() as f64;
        let mean = closes.iter().sum::<f64>() / n;
        let variance = closes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
        Some(variance.sqrt())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub pe_ratio: f64,
    #[serde(default)]
    pub gross_profit: f64,
    #[serde(default)]
    pub market_cap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub code: String,
    pub detail: String,
    /// Counts toward the risk score
    pub risk: bool,
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.detail)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialAnalysis {
    pub fundamentals: Fundamentals,
    pub insights: Vec<Insight>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawArticle {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entities {
    pub companies: Vec<String>,
    pub dates: Vec<String>,
    pub numbers: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.companies.is_empty() && self.dates.is_empty() && self.numbers.is_empty()
    }
}

impl fmt::Display for Entities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "companies=[{}] dates=[{}] numbers=[{}]",
            self.companies.join(", "),
            self.dates.join(", "),
            self.numbers.join(", ")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedArticle {
    pub title: String,
    pub cleaned_summary: String,
    pub sentiment: Sentiment,
    pub score: u32,
    pub entities: Entities,
}

/// Output of the news normalization pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsDigest {
    pub ingested: usize,
    pub raw: Vec<RawArticle>,
    pub items: Vec<ClassifiedArticle>,
    pub summary: String,
}

impl NewsDigest {
    pub fn distinct_sentiments(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.sentiment)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Share of classified items with negative sentiment, `None` when empty
    pub fn negative_fraction(&self) -> Option<f64> {
        if self.items.is_empty() {
            return None;
        }
        let negative = self
            .items
            .iter()
            .filter(|item| item.sentiment == Sentiment::Negative)
            .count();
        Some(negative as f64 / self.items.len() as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilingSummary {
    pub form_type: String,
    #[serde(default)]
    pub filed_at: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub risk_factors: Option<String>,
    #[serde(default)]
    pub mdna: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroSnapshot {
    pub indicator: String,
    pub values: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolatilityReport {
    pub symbol: String,
    pub observations: usize,
    pub close_std_dev: f64,
    pub annualized_volatility: Option<f64>,
    pub high_volatility: bool,
}

/// Validated success payload, one schema per step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StepPayload {
    Prices(PriceSeries),
    Financials(FinancialAnalysis),
    News(NewsDigest),
    Filing(FilingSummary),
    Economic(MacroSnapshot),
    Volatility(VolatilityReport),
}

impl StepPayload {
    /// Validate raw tool data against the schema of `step`
    pub fn from_tool_data(
        step: StepName,
        data: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match step {
            StepName::Prices => StepPayload::Prices(serde_json::from_value(data)?),
            StepName::Financials => StepPayload::Financials(serde_json::from_value(data)?),
            StepName::News => StepPayload::News(serde_json::from_value(data)?),
            StepName::Edgar => StepPayload::Filing(serde_json::from_value(data)?),
            StepName::Economic => StepPayload::Economic(serde_json::from_value(data)?),
            StepName::VolatilityAnalysis => {
                StepPayload::Volatility(serde_json::from_value(data)?)
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Success { payload: StepPayload },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub timestamp: Option<DateTime<Utc>>,
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn success(payload: StepPayload, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            timestamp,
            outcome: StepOutcome::Success { payload },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            outcome: StepOutcome::Error {
                message: message.into(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, StepOutcome::Error { .. })
    }

    pub fn payload(&self) -> Option<&StepPayload> {
        match &self.outcome {
            StepOutcome::Success { payload } => Some(payload),
            StepOutcome::Error { .. } => None,
        }
    }

    /// True when the timestamp is less than `window` older than `reference`
    pub fn is_fresh(&self, reference: DateTime<Utc>, window: Duration) -> bool {
        self.timestamp
            .map(|ts| reference.signed_duration_since(ts) < window)
            .unwrap_or(false)
    }
}

//
// ================= Risk =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn rank(&self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
            RiskLevel::Critical => 3,
        }
    }

    pub fn from_risk_score(score: u32) -> Self {
        match score {
            0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            2 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

impl PartialOrd for RiskLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RiskLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

//
// ================= Reflection =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Completeness,
    Depth,
    Accuracy,
}

impl Criterion {
    /// Evaluation order, also the tie-break order for the weakest criterion
    pub const EVALUATION_ORDER: [Criterion; 3] =
        [Criterion::Completeness, Criterion::Depth, Criterion::Accuracy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Completeness => "completeness",
            Criterion::Depth => "depth",
            Criterion::Accuracy => "accuracy",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Scores {
    pub completeness: f64,
    pub depth: f64,
    pub accuracy: f64,
}

impl Scores {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Completeness => self.completeness,
            Criterion::Depth => self.depth,
            Criterion::Accuracy => self.accuracy,
        }
    }

    pub fn average(&self) -> f64 {
        (self.completeness + self.depth + self.accuracy) / 3.0
    }

    /// Lowest-scoring criterion; the first in evaluation order wins ties
    pub fn lowest(&self) -> Criterion {
        let mut lowest = Criterion::EVALUATION_ORDER[0];
        for criterion in Criterion::EVALUATION_ORDER.iter().skip(1) {
            if self.get(*criterion) < self.get(lowest) {
                lowest = *criterion;
            }
        }
        lowest
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Good,
    NeedsRefinement,
}

impl Verdict {
    pub fn from_average(average: f64) -> Self {
        if average >= 0.9 {
            Verdict::Excellent
        } else if average >= 0.75 {
            Verdict::Good
        } else {
            Verdict::NeedsRefinement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Excellent => "Excellent",
            Verdict::Good => "Good",
            Verdict::NeedsRefinement => "Refine: Boost depth with more insights",
        }
    }

    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Verdict::NeedsRefinement)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reflection {
    pub scores: Scores,
    pub average: f64,
    pub verdict: Verdict,
    pub feedback: String,
}

//
// ================= Report =================
//

/// Outputs of the specialist analysts that feed the strategist draft
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecialistReports {
    pub financial: String,
    pub news: String,
    pub market: String,
}

/// LLM-written narrative attached to a finished report
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Narrative {
    pub past_analysis: String,
    #[serde(default)]
    pub specialists: SpecialistReports,
    pub draft: String,
    pub feedback: Option<String>,
    pub final_report: String,
    pub revisions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub report_id: Uuid,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    pub plan: ResearchPlan,
    pub results: BTreeMap<StepName, StepResult>,
    pub reflection: Option<Reflection>,
    pub learned_insights: Vec<String>,
    #[serde(default)]
    pub refinements: Vec<String>,
    #[serde(default)]
    pub trace: Vec<String>,
    #[serde(default)]
    pub executions: u32,
    #[serde(default)]
    pub narrative: Option<Narrative>,
}

impl Report {
    pub fn result(&self, step: StepName) -> Option<&StepResult> {
        self.results.get(&step)
    }

    pub fn financial_analysis(&self) -> Option<&FinancialAnalysis> {
        match self.result(StepName::Financials)?.payload()? {
            StepPayload::Financials(analysis) => Some(analysis),
            _ => None,
        }
    }

    pub fn news_digest(&self) -> Option<&NewsDigest> {
        match self.result(StepName::News)?.payload()? {
            StepPayload::News(digest) => Some(digest),
            _ => None,
        }
    }

    pub fn price_series(&self) -> Option<&PriceSeries> {
        match self.result(StepName::Prices)?.payload()? {
            StepPayload::Prices(series) => Some(series),
            _ => None,
        }
    }

    pub fn volatility(&self) -> Option<&VolatilityReport> {
        match self.result(StepName::VolatilityAnalysis)?.payload()? {
            StepPayload::Volatility(report) => Some(report),
            _ => None,
        }
    }

    pub fn average_score(&self) -> f64 {
        self.reflection.as_ref().map(|r| r.average).unwrap_or(0.0)
    }
}
