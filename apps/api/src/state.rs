use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::LlmBackend;
use crate::preferences::PreferenceStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Pluggable LLM backend. Production: `LlmClient`; tests: a scripted backend.
    pub llm: Arc<dyn LlmBackend>,
    pub config: Config,
    pub preferences: Arc<dyn PreferenceStore>,
}
