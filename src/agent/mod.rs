//! Research agent - implements the refinement loop
//!
//! PLANNING → EXECUTING → SCORING → (DONE | REFINING → PLANNING)

pub mod learning;

pub use learning::extract_learning;

use crate::audit::AuditLog;
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::execution::ExecutionEngine;
use crate::gemini::GeminiClient;
use crate::memory::{memory_store_from_config, JsonFileSemanticStore, MemoryStore, SemanticStore};
use crate::models::{Criterion, Report, StepName};
use crate::planner::{AdaptivePlanner, Planner};
use crate::reflection::{ReflectionScorer, ACCEPTANCE_THRESHOLD};
use crate::report::{self, ReportExporter};
use crate::synthesis::{past_analysis_query, ReportSynthesizer, NO_PRIOR_ANALYSIS};
use crate::tools::create_default_registry;
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Controller states, recorded in the report trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchState {
    Planning,
    Executing,
    Scoring,
    Refining,
    Done,
}

impl fmt::Display for ResearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResearchState::Planning => "PLANNING",
            ResearchState::Executing => "EXECUTING",
            ResearchState::Scoring => "SCORING",
            ResearchState::Refining => "REFINING",
            ResearchState::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// Single step re-fetched to lift the weakest criterion
pub fn redo_step_for(criterion: Criterion) -> StepName {
    match criterion {
        Criterion::Depth => StepName::Financials,
        _ => StepName::News,
    }
}

/// Semantic-store document id for an analysis of `symbol` at `at`
pub fn analysis_document_id(symbol: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", symbol, at.format("%Y-%m-%d-%H:%M:%S"))
}

struct Narrator {
    synthesizer: ReportSynthesizer,
    store: Arc<dyn SemanticStore>,
}

/// Coordinates planning, execution, scoring and learning for one symbol
pub struct ResearchAgent {
    planner: Box<dyn Planner>,
    execution_engine: ExecutionEngine,
    scorer: ReflectionScorer,
    memory: Arc<dyn MemoryStore>,
    audit_log: Arc<AuditLog>,
    exporter: Option<ReportExporter>,
    narrator: Option<Narrator>,
}

impl ResearchAgent {
    pub fn new(
        planner: Box<dyn Planner>,
        execution_engine: ExecutionEngine,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            planner,
            execution_engine,
            scorer: ReflectionScorer::new(),
            memory,
            audit_log: Arc::new(AuditLog::new()),
            exporter: None,
            narrator: None,
        }
    }

    pub fn with_exporter(mut self, exporter: ReportExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_narrative(
        mut self,
        synthesizer: ReportSynthesizer,
        store: Arc<dyn SemanticStore>,
    ) -> Self {
        self.narrator = Some(Narrator { synthesizer, store });
        self
    }

    pub fn memory(&self) -> Arc<dyn MemoryStore> {
        self.memory.clone()
    }

    pub fn audit_log(&self) -> Arc<AuditLog> {
        self.audit_log.clone()
    }

    /// Research `symbol`, refining at most `max_refinements` times.
    ///
    /// Data failures never abort the run; they lower the scores. Errors are
    /// returned only for memory, export and plan-shape failures.
    pub async fn research(&self, symbol: &str, max_refinements: u32) -> Result<Report> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ResearchError::InvalidPlan("symbol must not be empty".to_string()));
        }

        let start_time = Instant::now();
        let mut trace = Vec::new();
        let mut refinements = Vec::new();
        let mut executions = 0u32;
        let mut iteration = 0u32;

        info!(symbol = %symbol, max_refinements, "Research: starting");

        let memory = self.memory.load().await?;
        let mut report = report::empty_report(&symbol);

        while iteration <= max_refinements {
            // === PLAN ===
            trace.push(format!("{}: iteration {}", ResearchState::Planning, iteration));
            let plan = self.planner.plan(&symbol, &memory);
            trace.push(format!("{}: {}", ResearchState::Planning, plan));

            // === EXECUTE ===
            trace.push(format!("{}: {} steps", ResearchState::Executing, plan.len()));
            let results = self.execution_engine.execute_plan(&plan, &symbol).await?;
            executions += 1;

            let failed: Vec<String> = results
                .iter()
                .filter(|(_, r)| r.is_error())
                .map(|(step, _)| step.to_string())
                .collect();
            if !failed.is_empty() {
                trace.push(format!(
                    "{}: failed steps [{}]",
                    ResearchState::Executing,
                    failed.join(", ")
                ));
            }

            // === SCORE ===
            report = report::assemble(&plan, results, &symbol);
            let reflection = self.scorer.score(&report);
            trace.push(format!("{}: {}", ResearchState::Scoring, reflection.feedback));

            let average = reflection.average;
            let weakest = reflection.scores.lowest();
            report.reflection = Some(reflection);

            if average >= ACCEPTANCE_THRESHOLD {
                trace.push(format!("{}: accepted at iteration {}", ResearchState::Done, iteration));
                debug!(symbol = %symbol, average, iteration, "Research accepted");
                break;
            }

            // === REFINE ===
            let redo = redo_step_for(weakest);
            let result = self.execution_engine.run_step(redo, &symbol).await;
            report.results.insert(redo, result);

            iteration += 1;
            let note = format!("Refined {} for {} (iter {})", redo, weakest, iteration);
            warn!(symbol = %symbol, average, criterion = %weakest, step = %redo, "Refining");
            trace.push(format!("{}: {}", ResearchState::Refining, note));
            refinements.push(note);
        }

        if iteration > max_refinements {
            trace.push(format!(
                "{}: refinement cap {} reached",
                ResearchState::Done,
                max_refinements
            ));
        }

        report.refinements = refinements;
        report.executions = executions;

        // === LEARN ===
        let learned = extract_learning(&report);
        report.learned_insights = learned.clone();
        let run = self.memory.append(&symbol, &learned, Utc::now()).await?;
        trace.push(format!(
            "LEARN: [{}] recorded as run {}",
            learned.join(", "),
            run.run_id
        ));

        if let Some(narrator) = &self.narrator {
            report.narrative = Some(self.narrate(narrator, &report).await);
            trace.push("NARRATE: narrative attached".to_string());
        }

        report.trace = trace;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        self.audit_log.record(report.clone(), execution_time_ms).await?;

        if let Some(exporter) = &self.exporter {
            exporter.export(&report).await?;
        }

        info!(
            symbol = %symbol,
            report_id = %report.report_id,
            average = report.average_score(),
            executions,
            learned = ?report.learned_insights,
            execution_time_ms,
            "Research: complete"
        );

        Ok(report)
    }

    async fn narrate(&self, narrator: &Narrator, report: &Report) -> crate::models::Narrative {
        let past_analysis = match narrator
            .store
            .query(&past_analysis_query(&report.symbol), 1)
            .await
        {
            Ok(hits) if !hits.is_empty() => hits.join("\n"),
            Ok(_) => NO_PRIOR_ANALYSIS.to_string(),
            Err(e) => {
                warn!(symbol = %report.symbol, error = %e, "Semantic store query failed");
                format!("Error accessing memory system: {}", e)
            }
        };

        let narrative = narrator.synthesizer.synthesize(report, &past_analysis).await;

        let mut metadata = BTreeMap::new();
        metadata.insert("symbol".to_string(), report.symbol.clone());
        metadata.insert("report_id".to_string(), report.report_id.to_string());
        metadata.insert("timestamp".to_string(), report.created_at.to_rfc3339());

        let id = analysis_document_id(&report.symbol, report.created_at);
        if let Err(e) = narrator
            .store
            .add(&id, &narrative.final_report, metadata)
            .await
        {
            warn!(symbol = %report.symbol, error = %e, "Failed to store analysis");
        }

        narrative
    }
}

/// Agent wired from configuration: adaptive planner, configured data source
/// and memory backend. With `narrative` set and a Gemini key present, a
/// narrative is synthesized for every report.
pub fn create_default_agent(config: &ResearchConfig, narrative: bool) -> Result<ResearchAgent> {
    let registry = create_default_registry(config)?;
    let engine = ExecutionEngine::new(registry, config.parallel_fetch);
    let memory = memory_store_from_config(config)?;

    let mut agent = ResearchAgent::new(Box::new(AdaptivePlanner), engine, memory);

    if narrative {
        match config.gemini_api_key.as_deref() {
            Some(key) => {
                let client = GeminiClient::new(key.to_string())?;
                info!(path = %config.semantic_path.display(), "Analysis store: json file");
                agent = agent.with_narrative(
                    ReportSynthesizer::new(Arc::new(client)),
                    Arc::new(JsonFileSemanticStore::new(config.semantic_path.clone())),
                );
            }
            None => warn!("Narrative requested but GEMINI_API_KEY is not set; skipping"),
        }
    }

    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryMemoryStore, InMemorySemanticStore};
    use crate::models::ToolOutput;
    use crate::synthesis::TextGenerator;
    use crate::tools::{Tool, ToolRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OfflinePrices {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Tool for OfflinePrices {
        fn step(&self) -> StepName {
            StepName::Prices
        }

        fn description(&self) -> &'static str {
            "always offline"
        }

        async fn fetch(&self, _symbol: &str) -> Result<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::failed("gateway offline"))
        }
    }

    struct SlowPrices;

    #[async_trait::async_trait]
    impl Tool for SlowPrices {
        fn step(&self) -> StepName {
            StepName::Prices
        }

        fn description(&self) -> &'static str {
            "slow gateway"
        }

        async fn fetch(&self, _symbol: &str) -> Result<ToolOutput> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(ToolOutput::failed("gateway offline"))
        }
    }

    struct FixedGenerator;

    #[async_trait::async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            if prompt.contains("gatekeeper") {
                Ok("No".to_string())
            } else {
                Ok("AAPL analysis: Hold".to_string())
            }
        }
    }

    fn snapshot_agent(memory: Arc<InMemoryMemoryStore>) -> ResearchAgent {
        let registry = create_default_registry(&ResearchConfig::default()).unwrap();
        ResearchAgent::new(
            Box::new(AdaptivePlanner),
            ExecutionEngine::new(registry, false),
            memory,
        )
    }

    #[tokio::test]
    async fn test_failing_data_stops_at_refinement_cap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(OfflinePrices {
            calls: calls.clone(),
        }));
        let memory = Arc::new(InMemoryMemoryStore::new());
        let agent = ResearchAgent::new(
            Box::new(AdaptivePlanner),
            ExecutionEngine::new(registry, false),
            memory.clone(),
        );

        let report = agent.research("aapl", 2).await.unwrap();

        assert_eq!(report.executions, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.refinements.len(), 3);
        assert_eq!(report.refinements[0], "Refined news for completeness (iter 1)");
        assert_eq!(report.symbol, "AAPL");
        assert!(report.learned_insights.is_empty());

        let stored = memory.load().await.unwrap();
        assert_eq!(stored.insights_for("AAPL"), &["earnings_preview_needed"]);
        assert_eq!(stored.runs.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_runs_keep_both_symbols_in_memory() {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(SlowPrices));
        let memory = Arc::new(InMemoryMemoryStore::new());
        let agent = ResearchAgent::new(
            Box::new(AdaptivePlanner),
            ExecutionEngine::new(registry, false),
            memory.clone(),
        );

        let (aapl, msft) = tokio::join!(agent.research("AAPL", 0), agent.research("MSFT", 0));
        aapl.unwrap();
        msft.unwrap();

        let stored = memory.load().await.unwrap();
        assert!(stored.insights.contains_key("AAPL"));
        assert!(stored.insights.contains_key("MSFT"));
        assert_eq!(stored.runs.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_refinements_runs_once() {
        let agent = ResearchAgent::new(
            Box::new(AdaptivePlanner),
            ExecutionEngine::new(ToolRegistry::default(), false),
            Arc::new(InMemoryMemoryStore::new()),
        );

        let report = agent.research("MSFT", 0).await.unwrap();
        assert_eq!(report.executions, 1);
        assert_eq!(report.refinements.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_run_learns_and_adapts_next_plan() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let agent = snapshot_agent(memory.clone());

        let first = agent.research("AAPL", 2).await.unwrap();
        assert_eq!(first.executions, 1);
        assert!(first.refinements.is_empty());
        assert!(first.average_score() >= ACCEPTANCE_THRESHOLD);
        assert!(first.learned_insights.contains(&"high_risk".to_string()));
        assert_eq!(first.plan.steps()[0], StepName::Prices);

        let stored = memory.load().await.unwrap();
        assert!(stored.has_insight("AAPL", "high_risk"));
        assert!(stored.has_insight("AAPL", "earnings_preview_needed"));

        let second = agent.research("AAPL", 2).await.unwrap();
        assert_eq!(second.plan.steps()[0], StepName::Financials);
        assert!(second.plan.contains(StepName::Economic));

        let audit = agent.audit_log();
        assert!(audit.verify_integrity(second.report_id).await.unwrap());
        assert_eq!(audit.list_for_symbol("AAPL").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_narrative_is_attached_and_remembered() {
        let store = Arc::new(InMemorySemanticStore::new());
        let agent = snapshot_agent(Arc::new(InMemoryMemoryStore::new())).with_narrative(
            ReportSynthesizer::new(Arc::new(FixedGenerator)),
            store.clone(),
        );

        let first = agent.research("AAPL", 1).await.unwrap();
        let narrative = first.narrative.unwrap();
        assert_eq!(narrative.final_report, "AAPL analysis: Hold");
        assert_eq!(narrative.past_analysis, NO_PRIOR_ANALYSIS);
        assert_eq!(store.len().await, 1);

        let second = agent.research("AAPL", 1).await.unwrap();
        assert_eq!(second.narrative.unwrap().past_analysis, "AAPL analysis: Hold");
    }

    #[tokio::test]
    async fn test_exported_files_exist() {
        let dir = tempfile::tempdir().unwrap();
        let agent = snapshot_agent(Arc::new(InMemoryMemoryStore::new()))
            .with_exporter(ReportExporter::new(dir.path()));

        agent.research("AAPL", 0).await.unwrap();
        assert!(dir.path().join("AAPL_report.md").exists());
        assert!(dir.path().join("AAPL_report.json").exists());
    }

    #[test]
    fn test_redo_mapping_and_document_id() {
        assert_eq!(redo_step_for(Criterion::Depth), StepName::Financials);
        assert_eq!(redo_step_for(Criterion::Completeness), StepName::News);
        assert_eq!(redo_step_for(Criterion::Accuracy), StepName::News);

        let at = DateTime::parse_from_rfc3339("2025-10-10T09:30:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(analysis_document_id("AAPL", at), "AAPL_2025-10-10-09:30:05");
    }

    #[test]
    fn test_empty_symbol_is_rejected() {
        let agent = ResearchAgent::new(
            Box::new(AdaptivePlanner),
            ExecutionEngine::new(ToolRegistry::default(), false),
            Arc::new(InMemoryMemoryStore::new()),
        );
        let result = tokio_test::block_on(agent.research("   ", 2));
        assert!(matches!(result, Err(ResearchError::InvalidPlan(_))));
    }
}
