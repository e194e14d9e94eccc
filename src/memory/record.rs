//! Learned-insight memory record

use super::tags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One completed research run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunEntry {
    pub run_id: Uuid,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-symbol learned insights plus the global run log.
///
/// Insight lists only grow. Duplicates are kept; readers must tolerate them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    #[serde(default)]
    pub insights: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub runs: Vec<RunEntry>,
}

impl MemoryRecord {
    pub fn insights_for(&self, symbol: &str) -> &[String] {
        self.insights
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_insight(&self, symbol: &str, tag: &str) -> bool {
        self.insights_for(symbol).iter().any(|i| i == tag)
    }

    pub fn runs_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a RunEntry> + 'a {
        self.runs.iter().filter(move |run| run.symbol == symbol)
    }

    /// Fold the outcome of a finished run into memory: learned tags are
    /// appended, the earnings-preview sentinel is added once per symbol, and
    /// the run is logged.
    pub fn absorb(&mut self, symbol: &str, learned: &[String], at: DateTime<Utc>) -> RunEntry {
        let insights = self.insights.entry(symbol.to_string()).or_default();
        insights.extend(learned.iter().cloned());

        if !insights.iter().any(|i| i == tags::EARNINGS_PREVIEW_NEEDED) {
            insights.push(tags::EARNINGS_PREVIEW_NEEDED.to_string());
        }

        let entry = RunEntry {
            run_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            timestamp: at,
        };
        self.runs.push(entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_appends_sentinel_once() {
        let mut memory = MemoryRecord::default();
        memory.absorb("AAPL", &["high_risk".to_string()], Utc::now());
        memory.absorb("AAPL", &["high_risk".to_string()], Utc::now());

        assert_eq!(
            memory.insights_for("AAPL"),
            &["high_risk", "earnings_preview_needed", "high_risk"]
        );
        assert_eq!(memory.runs_for("AAPL").count(), 2);
    }

    #[test]
    fn test_unknown_symbol_has_no_insights() {
        let memory = MemoryRecord::default();
        assert!(memory.insights_for("NONE").is_empty());
        assert!(!memory.has_insight("NONE", "high_risk"));
    }

    #[test]
    fn test_legacy_document_without_runs_parses() {
        let memory: MemoryRecord =
            serde_json::from_str(r#"{"insights": {"AAPL": ["high_risk", "high_risk"]}}"#).unwrap();
        assert_eq!(memory.insights_for("AAPL").len(), 2);
        assert!(memory.runs.is_empty());
    }
}
