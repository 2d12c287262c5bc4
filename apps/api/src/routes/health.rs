use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::config::Config;
use crate::db;
use crate::state::AppState;

fn env_report(config: &Config) -> Value {
    json!({
        "appEnv": config.app_env,
        "llmConfigured": config.llm_endpoint().is_some(),
        "uploadMaxSize": config.upload_max_size,
        "version": env!("CARGO_PKG_VERSION"),
    })
}

/// Required variables first, then the database: 500 lists what is missing,
/// 503 means the database did not answer.
pub async fn health_status(state: &AppState) -> (StatusCode, Value) {
    let missing = state.config.missing_required();
    if !missing.is_empty() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "status": "unhealthy", "error": "缺少必要的环境变量", "missing": missing }),
        );
    }

    if let Err(e) = db::ping(&state.db).await {
        error!("Health check database ping failed: {e}");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "status": "unhealthy", "database": "disconnected", "error": e.to_string() }),
        );
    }

    (
        StatusCode::OK,
        json!({
            "status": "healthy",
            "database": "connected",
            "env": env_report(&state.config),
        }),
    )
}

/// GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, body) = health_status(&state).await;
    (status, Json(body))
}
