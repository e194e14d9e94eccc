//! Narrative report synthesis
//!
//! Specialist analysts → strategist draft → risk-manager critique →
//! gatekeeper → refinement, repeated up to `MAX_REVISIONS` times.
//! Generation failures end up in the narrative text and never fail research.

use crate::models::{Narrative, Report, SpecialistReports, StepName, StepPayload};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Refinements allowed after the first critique
pub const MAX_REVISIONS: u32 = 1;

pub const NO_PRIOR_ANALYSIS: &str = "No prior analysis found in memory.";

/// Anything that turns a prompt into text
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Query used to pull prior conclusions for `symbol` from the semantic store
pub fn past_analysis_query(symbol: &str) -> String {
    format!("What was my past analysis and conclusion for {}?", symbol)
}

/// Specialist analyst roles consulted before the strategist draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Specialist {
    Financial,
    News,
    Market,
}

impl Specialist {
    fn label(&self) -> &'static str {
        match self {
            Specialist::Financial => "financial",
            Specialist::News => "news",
            Specialist::Market => "market",
        }
    }

    fn prompt(&self, data: &str) -> String {
        match self {
            Specialist::Financial => financial_analyst_prompt(data),
            Specialist::News => news_analyst_prompt(data),
            Specialist::Market => market_analyst_prompt(data),
        }
    }
}

pub struct ReportSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl ReportSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn synthesize(&self, report: &Report, past_analysis: &str) -> Narrative {
        let sections = SpecialistSections::from_report(report);

        info!(symbol = %report.symbol, "Synthesizing narrative report");

        let (financial, news, market) = tokio::join!(
            self.consult(Specialist::Financial, &sections.financial),
            self.consult(Specialist::News, &sections.news),
            self.consult(Specialist::Market, &sections.macro_context),
        );
        let mut narrative = Narrative {
            past_analysis: past_analysis.to_string(),
            specialists: SpecialistReports {
                financial,
                news,
                market,
            },
            ..Narrative::default()
        };

        let draft_prompt = synthesis_prompt(
            &report.symbol,
            past_analysis,
            &sections.filings,
            &narrative.specialists,
        );
        narrative.draft = match self.generator.generate(&draft_prompt).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(symbol = %report.symbol, error = %e, "Draft generation failed");
                narrative.final_report = format!("Error generating report: {}", e);
                return narrative;
            }
        };

        let mut current = narrative.draft.clone();
        while narrative.revisions < MAX_REVISIONS {
            let feedback = match self.generator.generate(&evaluator_prompt(&current)).await {
                Ok(feedback) => feedback,
                Err(e) => {
                    warn!(symbol = %report.symbol, error = %e, "Critique failed, keeping report");
                    break;
                }
            };
            narrative.feedback = Some(feedback.clone());

            if !self.needs_revision(&feedback).await {
                break;
            }

            let refine_prompt =
                refinement_prompt(&report.symbol, &narrative.specialists, &feedback);
            match self.generator.generate(&refine_prompt).await {
                Ok(text) => {
                    current = text;
                    narrative.revisions += 1;
                }
                Err(e) => {
                    warn!(symbol = %report.symbol, error = %e, "Refinement failed");
                    current = format!("Error generating report: {}", e);
                    break;
                }
            }
        }
        narrative.final_report = current;

        debug!(symbol = %report.symbol, revisions = narrative.revisions, "Narrative complete");
        narrative
    }

    /// One specialist opinion; failures become the opinion text
    async fn consult(&self, specialist: Specialist, data: &str) -> String {
        debug!(specialist = specialist.label(), "Routing to specialist analyst");
        match self.generator.generate(&specialist.prompt(data)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(specialist = specialist.label(), error = %e, "Specialist analysis failed");
                format!("Error during {} analysis: {}", specialist.label(), e)
            }
        }
    }

    /// Gatekeeper decision; failures count as "no revision"
    async fn needs_revision(&self, feedback: &str) -> bool {
        match self.generator.generate(&gatekeeper_prompt(feedback)).await {
            Ok(answer) => answer.trim().to_lowercase().contains("yes"),
            Err(e) => {
                warn!(error = %e, "Gatekeeper failed, ending without revision");
                false
            }
        }
    }
}

//
// ================= Prompt inputs =================
//

/// Report data handed to each specialist
struct SpecialistSections {
    financial: String,
    news: String,
    macro_context: String,
    filings: String,
}

impl SpecialistSections {
    fn from_report(report: &Report) -> Self {
        let financial = match report.financial_analysis() {
            Some(analysis) => {
                let f = &analysis.fundamentals;
                let mut text = format!(
                    "Revenue: {:.0}, P/E: {:.2}, Gross profit: {:.0}, Market cap: {:.0}. Risk level: {:?} (score {}).",
                    f.revenue, f.pe_ratio, f.gross_profit, f.market_cap,
                    analysis.risk_level, analysis.risk_score
                );
                for insight in &analysis.insights {
                    text.push_str(&format!("\n- {}", insight));
                }
                text
            }
            None => unavailable(report, StepName::Financials),
        };

        let news = match report.news_digest() {
            Some(digest) if !digest.summary.is_empty() => digest.summary.clone(),
            Some(_) => "No notable news.".to_string(),
            None => unavailable(report, StepName::News),
        };

        let macro_context = match report.result(StepName::Economic).and_then(|r| r.payload()) {
            Some(StepPayload::Economic(snapshot)) => {
                let values: Vec<String> = snapshot
                    .values
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                format!("{}: {}", snapshot.indicator, values.join(", "))
            }
            _ => unavailable(report, StepName::Economic),
        };

        let filings = match report.result(StepName::Edgar).and_then(|r| r.payload()) {
            Some(StepPayload::Filing(filing)) => format!("{}: {}", filing.form_type, filing.summary),
            _ => unavailable(report, StepName::Edgar),
        };

        Self {
            financial,
            news,
            macro_context,
            filings,
        }
    }
}

fn unavailable(report: &Report, step: StepName) -> String {
    match report.result(step) {
        Some(result) if result.is_error() => format!("{} data unavailable (fetch failed).", step),
        _ => format!("{} data not collected.", step),
    }
}

//
// ================= Prompts =================
//

fn financial_analyst_prompt(financial_data: &str) -> String {
    format!(
        r#"As a Quantitative Financial Analyst, your task is to analyze the provided key financial metrics for a company.
Focus on valuation, profitability, and financial health.
Provide a 3-5 bullet point summary of your findings, highlighting strengths and weaknesses.
Do not make a final recommendation. Your analysis must be objective and based solely on the data provided.

**Financial Data:**
{}
"#,
        financial_data
    )
}

fn news_analyst_prompt(news_analysis: &str) -> String {
    format!(
        r#"As an Investment News Analyst, your task is to interpret the provided structured news analysis.
Based on the sentiment, key takeaways, and summary, what is the likely short-term impact on the company's stock price?
Consider the source and content of the news. Provide a 2-3 sentence summary of your impact assessment.

**Structured News Analysis:**
{}
"#,
        news_analysis
    )
}

fn market_analyst_prompt(macro_data: &str) -> String {
    format!(
        r#"As a Macroeconomic Analyst, your task is to provide market context based on the latest economic indicators.
How might the current economic environment (inflation, interest rates, GDP) affect the broader stock market and the sector this company operates in?
Provide a 2-3 sentence summary of the overall market sentiment based on this data.

**Macroeconomic Data:**
{}
"#,
        macro_data
    )
}

fn synthesis_prompt(
    symbol: &str,
    past_analysis: &str,
    filings: &str,
    specialists: &SpecialistReports,
) -> String {
    format!(
        r#"You are a Chief Investment Strategist. Your task is to synthesize the analyses from your specialist teams into a final, coherent investment report.

**PRIOR ANALYSIS FOR CONTEXT (from your memory):**
---
{past_analysis}
---

**LATEST SEC FILING INSIGHTS:**
---
{filings}
---

**Quantitative Financial Analysis:**
{financial}
---
**News Impact Analysis:**
{news}
---
**Macroeconomic Context:**
{market}
---

Based on these inputs, create a comprehensive investment report for {symbol}. The report must include:
1. **Executive Summary (2-3 sentences)**
2. **Key Findings**: a bulleted list of the most critical points.
3. **Final Recommendation**: a clear 'Buy', 'Hold', or 'Sell' rating.
4. **Justification (3 bullet points)** referencing the specialist reports.
"#,
        past_analysis = past_analysis,
        filings = filings,
        financial = specialists.financial,
        news = specialists.news,
        market = specialists.market,
        symbol = symbol,
    )
}

fn evaluator_prompt(draft: &str) -> String {
    format!(
        r#"You are a skeptical Risk Manager. Critique the investment report below and identify weaknesses, biases, or gaps.
Consider whether the recommendation is too optimistic or pessimistic, whether the justification supports it, and whether a key risk was overlooked.

Provide your feedback in a concise, 2-4 bullet point list.

**DRAFT REPORT TO EVALUATE:**
---
{}
---
"#,
        draft
    )
}

fn gatekeeper_prompt(feedback: &str) -> String {
    format!(
        r#"You are a gatekeeper. Decide if a report needs revision based on the following feedback.
If the feedback points out any flaws, weaknesses, or areas for improvement, a revision is required.

Feedback:
---
{}
---

Is a revision required? Answer ONLY with the word "Yes" or "No"."#,
        feedback
    )
}

fn refinement_prompt(symbol: &str, specialists: &SpecialistReports, feedback: &str) -> String {
    format!(
        r#"You are the Chief Investment Strategist. Your draft report was reviewed by a Risk Manager.
Revise it based on their feedback into a more robust and balanced final version.

**1. Quantitative Financial Analysis:**
{financial}
---
**2. News Impact Analysis:**
{news}
---
**3. Macroeconomic Context:**
{market}
---

**Risk Manager's Feedback:**
---
{feedback}
---

Generate the final, refined investment report for {symbol}. Keep the structure (Executive Summary, Key Findings, Recommendation, Justification).
"#,
        financial = specialists.financial,
        news = specialists.news,
        market = specialists.market,
        feedback = feedback,
        symbol = symbol,
    )
}
