pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::interview::handlers as interview;
use crate::preferences::handlers as preferences;
use crate::resume::handlers as resume;
use crate::state::AppState;

/// Multipart framing on top of the largest accepted upload.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.upload_max_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/health", get(health::health_handler))
        // Résumé
        .route("/api/resume/upload", post(resume::handle_upload))
        .route("/api/resume/check", get(resume::handle_check))
        .route("/api/resume/ai-profile/:resume_id", get(resume::handle_ai_profile))
        .route("/api/resume/analyze", post(resume::handle_analyze))
        // Interview
        .route("/api/interview/generate", post(interview::handle_generate))
        .route(
            "/api/interview/generate-realtime",
            post(interview::handle_generate_realtime),
        )
        .route("/api/interview/evaluate", post(interview::handle_evaluate))
        .route(
            "/api/interview/generate-best-answers",
            post(interview::handle_generate_best_answers),
        )
        .route("/api/interview/report", post(interview::handle_report))
        .route(
            "/api/interview/download-report",
            get(interview::handle_download_report),
        )
        .route("/api/interview/:id", get(interview::handle_interview_detail))
        .route(
            "/api/dashboard/download-all-reports",
            post(interview::handle_download_all_reports),
        )
        // Job preferences
        .route(
            "/api/job-preference",
            post(preferences::handle_save_preference)
                .get(preferences::handle_list_preferences)
                .delete(preferences::handle_delete_preference),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{test_config, Config};
    use crate::llm_client::testing::ScriptedLlm;
    use crate::preferences::store::testing::MemoryPreferenceStore;

    /// State whose pool never connects: only routes that fail before touching
    /// the database can be exercised.
    fn offline_state(config: Config) -> AppState {
        AppState {
            db: PgPoolOptions::new()
                .connect_lazy(&config.database_url)
                .unwrap(),
            llm: Arc::new(ScriptedLlm::new()),
            config,
            preferences: Arc::new(MemoryPreferenceStore::default()),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        for (method, uri) in [
            ("GET", "/api/resume/check"),
            ("POST", "/api/interview/evaluate"),
            ("GET", "/api/job-preference"),
            ("POST", "/api/dashboard/download-all-reports"),
        ] {
            let app = build_router(offline_state(test_config()));
            let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(app, request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["type"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn test_health_reports_missing_env() {
        let mut config = test_config();
        config.nextauth_url = None;
        let app = build_router(offline_state(config));
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["missing"][0], "NEXTAUTH_URL");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = build_router(offline_state(test_config()));
        let request = Request::get("/api/v1/context").body(Body::empty()).unwrap();
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
