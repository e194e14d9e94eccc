use clap::Parser;
use investment_research_agent::{
    agent::create_default_agent, config::ResearchConfig, report::ReportExporter,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "research", about = "Adaptive investment research agent")]
struct Cli {
    /// Ticker symbol to research
    symbol: String,

    /// Upper bound on targeted refinements
    #[arg(long)]
    max_refinements: Option<u32>,

    /// Directory for the Markdown and JSON reports
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Path of the JSON memory file
    #[arg(long)]
    memory: Option<PathBuf>,

    /// Synthesize an LLM narrative (requires GEMINI_API_KEY)
    #[arg(long)]
    narrative: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ResearchConfig::from_env();

    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(path) = cli.memory {
        config.memory_path = path;
    }
    let max_refinements = cli.max_refinements.unwrap_or(config.max_refinements);
    let symbol = cli.symbol.trim().to_uppercase();

    let exporter = ReportExporter::new(config.output_dir.clone());
    let markdown_path = exporter.markdown_path(&symbol);
    let agent = create_default_agent(&config, cli.narrative)?.with_exporter(exporter);

    info!(symbol = %symbol, max_refinements, "Running research");

    let report = agent.research(&symbol, max_refinements).await?;

    println!("\n=== RESEARCH REPORT: {} ===", report.symbol);
    println!("Report ID: {}", report.report_id);
    println!("Plan: {}", report.plan);
    if let Some(reflection) = &report.reflection {
        println!("Reflection: {}", reflection.feedback);
    }
    println!("Executions: {}", report.executions);
    for note in &report.refinements {
        println!("Refinement: {}", note);
    }
    println!(
        "Learned insights: {}",
        if report.learned_insights.is_empty() {
            "none".to_string()
        } else {
            report.learned_insights.join(", ")
        }
    );
    println!("\nTrace:");
    for (i, line) in report.trace.iter().enumerate() {
        println!("  {}: {}", i + 1, line);
    }
    println!("\nReport written to {}", markdown_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_symbol_is_positional() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["research", " aapl ", "--max-refinements", "1", "--narrative"])
            .unwrap();
        assert_eq!(cli.symbol.trim().to_uppercase(), "AAPL");
        assert_eq!(cli.max_refinements, Some(1));
        assert!(cli.narrative);

        assert!(Cli::try_parse_from(["research"]).is_err());
    }
}
