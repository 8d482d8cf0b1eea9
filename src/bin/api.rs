use cash_horizon::{
    api::start_server,
    config::Settings,
    orchestrator::WorkflowOrchestrator,
    summarizer::{gemini::GeminiSummarizer, MockSummarizer, Summarizer},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    info!("🚀 Cash Horizon - API Server");
    info!("📍 Port: {}", settings.api_port);

    let summarizer: Arc<dyn Summarizer> = if settings.has_api_key() {
        info!(model = %settings.summarizer.model, "Using Gemini summarizer");
        Arc::new(GeminiSummarizer::new(&settings.summarizer)?)
    } else {
        warn!("⚠️  GEMINI_API_KEY not set; narratives come from the mock summarizer");
        Arc::new(MockSummarizer::new())
    };

    let orchestrator = Arc::new(WorkflowOrchestrator::new(summarizer, &settings));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, settings.api_port).await?;

    Ok(())
}
