use investment_research_agent::{
    agent::create_default_agent, api::start_server, config::ResearchConfig,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ResearchConfig::from_env();

    info!("Investment Research Agent - API Server");
    info!(
        port = config.api_port,
        data_source = config.market_data_base_url.as_deref().unwrap_or("snapshot"),
        memory = if config.database_url.is_some() { "postgres" } else { "json file" },
        "Configuration loaded"
    );

    let narrative = config.gemini_api_key.is_some();
    let agent = Arc::new(create_default_agent(&config, narrative)?);

    info!("Research agent initialized");

    start_server(agent, config.max_refinements, config.api_port).await?;

    Ok(())
}
