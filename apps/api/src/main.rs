mod analysis;
mod auth;
mod config;
mod db;
mod document;
mod errors;
mod interview;
mod llm_client;
mod models;
mod preferences;
mod privacy;
mod resume;
mod routes;
mod state;
mod tasks;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::preferences::PgPreferenceStore;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (reads .env; fails on missing DATABASE_URL or malformed numbers)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CodeMockLab API v{}", env!("CARGO_PKG_VERSION"));

    let missing = config.missing_required();
    if !missing.is_empty() {
        warn!("Missing environment variables: {missing:?}; /api/health will report unhealthy");
    }
    if config.redis_url.is_some() {
        info!("REDIS_URL is set but no component uses Redis");
    }

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize LLM client
    let llm = LlmClient::new(config.llm_endpoint());
    info!("LLM client initialized (model: {})", llm.model());

    let state = AppState {
        db: db.clone(),
        llm: Arc::new(llm),
        config: config.clone(),
        preferences: Arc::new(PgPreferenceStore::new(db)),
    };

    // Durable background tasks: best answers, résumé re-analysis, reports
    tasks::worker::spawn(state.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
