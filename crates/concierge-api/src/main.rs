//! Concierge API server
//!
//! Serves the customer-service responder over HTTP: `POST /chat`,
//! `POST /chat/stream` (server-sent events) and `GET /health`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use concierge_common::{AgentConfig, DEFAULT_USE_CASE, KnowledgeBaseConfig};
use concierge_core::{KnowledgeBase, LLMService, SessionStore};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;

/// Command-line arguments for the Concierge API server
#[derive(Parser, Debug)]
#[clap(name = "concierge-api", about = "HTTP server for the Concierge customer-service responder")]
struct Args {
    /// Host to bind to
    #[clap(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[clap(short, long, default_value = "8000")]
    port: u16,

    /// Use-case selecting the tone of replies (support, sales, therapy)
    #[clap(long, default_value = DEFAULT_USE_CASE)]
    use_case: String,

    /// Knowledge base file (.json, .yaml or .yml); the bundled sample is used otherwise
    #[clap(long)]
    knowledge_base: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Concierge API server...");

    let config = AgentConfig::from_env()?;
    info!("Model: {}", config.model_name());
    info!("Use-case: {}", args.use_case);

    let kb_config = args
        .knowledge_base
        .map(KnowledgeBaseConfig::new)
        .or_else(|| config.knowledge_base().cloned());
    let knowledge_base = match kb_config {
        Some(kb_config) => {
            info!("Knowledge base: {:?}", kb_config.path);
            KnowledgeBase::load(&kb_config)?
        }
        None => {
            info!("Knowledge base: bundled sample");
            KnowledgeBase::sample()
        }
    };

    let llm_service = LLMService::from_config(&config)?;
    let sessions = SessionStore::new(
        Arc::new(config),
        Arc::new(llm_service),
        Arc::new(knowledge_base),
        args.use_case,
    )?;
    let sessions = Arc::new(sessions);

    // Drop idle sessions in the background
    let sweeper = sessions.clone();
    tokio::spawn(async move {
        let period = sweeper
            .idle_ttl()
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            sweeper.evict_idle(chrono::Utc::now()).await;
        }
    });

    let app = api::app(api::chat::ChatState { sessions });

    let addr = format!("{}:{}", args.host, args.port);
    info!("Binding to address: {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
