//! Execution engine for plan execution
//!
//! Runs every step of a plan through the tool registry and validates each
//! tool output at the boundary. A failing step never aborts the plan.
//! LLM is NOT allowed here.

use crate::error::ResearchError;
use crate::models::{ResearchPlan, StepName, StepPayload, StepResult, ToolOutput};
use crate::tools::ToolRegistry;
use crate::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum steps allowed per plan
pub const MAX_STEPS_PER_PLAN: usize = 50;

/// Executes research plans against a tool registry
pub struct ExecutionEngine {
    tool_registry: ToolRegistry,
    parallel: bool,
}

impl ExecutionEngine {
    pub fn new(tool_registry: ToolRegistry, parallel: bool) -> Self {
        Self {
            tool_registry,
            parallel,
        }
    }

    /// Execute every step of `plan` for `symbol`.
    ///
    /// Results are keyed by step. When a step appears more than once it is
    /// fetched each time and the later result is kept.
    pub async fn execute_plan(
        &self,
        plan: &ResearchPlan,
        symbol: &str,
    ) -> Result<BTreeMap<StepName, StepResult>> {
        if plan.len() > MAX_STEPS_PER_PLAN {
            return Err(ResearchError::InvalidPlan(format!(
                "Plan exceeds maximum allowed steps ({})",
                MAX_STEPS_PER_PLAN
            )));
        }

        debug!(symbol, plan = %plan, parallel = self.parallel, "Starting plan execution");
        let start = Instant::now();

        let executed: Vec<(StepName, StepResult)> = if self.parallel {
            join_all(
                plan.iter()
                    .map(|step| async move { (*step, self.run_step(*step, symbol).await) }),
            )
            .await
        } else {
            let mut executed = Vec::with_capacity(plan.len());
            for step in plan.iter() {
                executed.push((*step, self.run_step(*step, symbol).await));
            }
            executed
        };

        // plan order, so later duplicates overwrite earlier ones
        let mut results = BTreeMap::new();
        for (step, result) in executed {
            results.insert(step, result);
        }

        debug!(
            symbol,
            result_count = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Plan execution completed"
        );

        Ok(results)
    }

    /// Fetch and validate a single step
    pub async fn run_step(&self, step: StepName, symbol: &str) -> StepResult {
        let output = self.tool_registry.dispatch(step, symbol).await;
        validate_output(step, output)
    }
}

/// Turn a raw tool output into a typed step result.
///
/// Payloads that do not match the step schema become error results.
pub fn validate_output(step: StepName, output: ToolOutput) -> StepResult {
    if !output.success {
        let message = output
            .error
            .unwrap_or_else(|| format!("{} failed without an error message", step));
        return StepResult::error(message);
    }

    let timestamp = output.timestamp.as_deref().and_then(parse_timestamp);

    match StepPayload::from_tool_data(step, output.data) {
        Ok(payload) => StepResult::success(payload, timestamp),
        Err(e) => {
            warn!(step = %step, error = %e, "Tool output failed validation");
            StepResult::error(format!("Invalid {} payload: {}", step, e))
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!(timestamp = raw, error = %e, "Unparseable tool timestamp");
            None
        }
    }
}
