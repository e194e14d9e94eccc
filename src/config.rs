//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from a
//! `.env` file). Anything missing or malformed falls back to a default.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_REFINEMENTS: u32 = 2;
pub const DEFAULT_NEWS_LIMIT: usize = 5;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub memory_path: PathBuf,
    pub semantic_path: PathBuf,
    pub output_dir: PathBuf,
    pub max_refinements: u32,
    pub news_limit: usize,
    pub fetch_timeout: Duration,
    pub parallel_fetch: bool,
    pub market_data_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub database_url: Option<String>,
    pub api_port: u16,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            memory_path: PathBuf::from("agent_memory.json"),
            semantic_path: PathBuf::from("agent_analyses.json"),
            output_dir: PathBuf::from("."),
            max_refinements: DEFAULT_MAX_REFINEMENTS,
            news_limit: DEFAULT_NEWS_LIMIT,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            parallel_fetch: false,
            market_data_base_url: None,
            gemini_api_key: None,
            database_url: None,
            api_port: DEFAULT_API_PORT,
        }
    }
}

impl ResearchConfig {
    /// Load `.env` (if present) and read configuration from the environment
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            memory_path: non_empty("RESEARCH_MEMORY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.memory_path),
            semantic_path: non_empty("RESEARCH_SEMANTIC_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.semantic_path),
            output_dir: non_empty("RESEARCH_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_refinements: parse_or(
                "RESEARCH_MAX_REFINEMENTS",
                non_empty("RESEARCH_MAX_REFINEMENTS"),
                defaults.max_refinements,
            ),
            news_limit: parse_or(
                "RESEARCH_NEWS_LIMIT",
                non_empty("RESEARCH_NEWS_LIMIT"),
                defaults.news_limit,
            ),
            fetch_timeout: Duration::from_secs(parse_or(
                "RESEARCH_FETCH_TIMEOUT_SECS",
                non_empty("RESEARCH_FETCH_TIMEOUT_SECS"),
                DEFAULT_FETCH_TIMEOUT_SECS,
            )),
            parallel_fetch: non_empty("RESEARCH_PARALLEL_FETCH")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.parallel_fetch),
            market_data_base_url: non_empty("MARKET_DATA_BASE_URL")
                .or_else(|| non_empty("FINANCIAL_API_BASE_URL"))
                .map(|url| url.trim_end_matches('/').to_string()),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            database_url: non_empty("POSTGRES_URL").or_else(|| non_empty("DATABASE_URL")),
            api_port: parse_or(
                "PORT",
                non_empty("PORT").or_else(|| non_empty("API_PORT")),
                defaults.api_port,
            ),
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %value, "Invalid configuration value, using default");
            default
        }),
        None => default,
    }
}
