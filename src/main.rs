use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use email_triage::api::analysis_routes;
use email_triage::config::AppConfig;
use email_triage::llm::{LlmProvider, create_provider};
use email_triage::pipeline::EmailAnalyzer;
use email_triage::sentiment::{HuggingFaceProvider, SentimentProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    eprintln!("📧 Email Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/analyze", config.port);
    eprintln!("   Upload: http://0.0.0.0:{}/analyze", config.port);
    eprintln!("   Arbiter: {:?}", config.analyzer.arbiter.policy);

    // ── LLM (optional) ──────────────────────────────────────────────
    let llm: Option<Arc<dyn LlmProvider>> = match &config.llm {
        Some(llm_config) => match create_provider(llm_config) {
            Ok(provider) => {
                info!(model = %llm_config.model, backend = ?llm_config.backend, "LLM classifier enabled");
                Some(provider)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create LLM provider, continuing without LLM");
                None
            }
        },
        None => {
            info!("No LLM API key configured, LLM classifier disabled");
            None
        }
    };

    // ── Sentiment model (optional) ──────────────────────────────────
    let sentiment: Option<Arc<dyn SentimentProvider>> = config.huggingface.clone().map(|hf| {
        info!(model = %hf.model, "Sentiment classifier enabled");
        Arc::new(HuggingFaceProvider::new(hf)) as Arc<dyn SentimentProvider>
    });

    let analyzer = Arc::new(EmailAnalyzer::new(config.analyzer.clone(), llm, sentiment));
    let app = analysis_routes(analyzer, config.max_body_bytes());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!(port = config.port, "Server listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
