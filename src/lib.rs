//! Adaptive Investment Research Agent
//!
//! Researches a ticker symbol by planning data-gathering steps, executing
//! them, grading the assembled report and refining weak spots. Insights
//! learned from each run are persisted and reshape future plans.
//!
//! LOOP:
//! PLAN → EXECUTE → SCORE → (DONE | REFINE → PLAN) → LEARN → EXPORT

pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod execution;
pub mod gemini;
pub mod insights;
pub mod memory;
pub mod models;
pub mod news;
pub mod planner;
pub mod reflection;
pub mod report;
pub mod synthesis;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{create_default_agent, ResearchAgent};
pub use config::ResearchConfig;
pub use models::*;
