//! Report assembly and rendering

pub mod export;

pub use export::ReportExporter;

use crate::models::{Report, ResearchPlan, StepName, StepResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt::Write;
use uuid::Uuid;

/// Characters of each step result shown in the rendered document
pub const PREVIEW_CHARS: usize = 200;

/// Bundle a plan and its results into a fresh, unscored report
pub fn assemble(
    plan: &ResearchPlan,
    results: BTreeMap<StepName, StepResult>,
    symbol: &str,
) -> Report {
    Report {
        report_id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        created_at: Utc::now(),
        plan: plan.clone(),
        results,
        reflection: None,
        learned_insights: Vec::new(),
        refinements: Vec::new(),
        trace: Vec::new(),
        executions: 0,
        narrative: None,
    }
}

/// Placeholder report for a run that has not executed yet
pub fn empty_report(symbol: &str) -> Report {
    assemble(&ResearchPlan::default(), BTreeMap::new(), symbol)
}

fn preview(result: &StepResult) -> String {
    let json = serde_json::to_string_pretty(result).unwrap_or_else(|e| e.to_string());
    if json.chars().count() <= PREVIEW_CHARS {
        return json;
    }
    let mut cut: String = json.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

/// Human-readable Markdown rendering of a report
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Research Report: {}\n", report.symbol);
    let _ = writeln!(out, "Generated: {}\n", report.created_at.to_rfc3339());
    let _ = writeln!(out, "Plan: {}\n", report.plan);

    out.push_str("## Results\n\n");
    if report.results.is_empty() {
        out.push_str("_No steps executed._\n\n");
    }
    for (step, result) in &report.results {
        let _ = writeln!(out, "### {}\n", step);
        let _ = writeln!(out, "```json\n{}\n```\n", preview(result));
    }

    if !report.refinements.is_empty() {
        out.push_str("## Refinements\n\n");
        for note in &report.refinements {
            let _ = writeln!(out, "- {}", note);
        }
        out.push('\n');
    }

    out.push_str("## Reflection\n\n");
    match &report.reflection {
        Some(reflection) => {
            let _ = writeln!(out, "{}\n", reflection.feedback);
            let _ = writeln!(
                out,
                "| Completeness | Depth | Accuracy |\n|---|---|---|\n| {:.2} | {:.2} | {:.2} |\n",
                reflection.scores.completeness, reflection.scores.depth, reflection.scores.accuracy
            );
        }
        None => out.push_str("_Not scored._\n\n"),
    }

    out.push_str("## Learned Insights\n\n");
    if report.learned_insights.is_empty() {
        out.push_str("None\n");
    } else {
        let _ = writeln!(out, "{}", report.learned_insights.join(", "));
    }

    if let Some(narrative) = &report.narrative {
        out.push_str("\n## Narrative\n\n");
        let _ = writeln!(out, "{}", narrative.final_report);
    }

    out
}
