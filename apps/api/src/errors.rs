use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::document::DocumentError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every variant renders the same envelope: `{ "error", "type", "details"? }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid input: {message}")]
    InvalidInput { code: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            code,
            message: message.into(),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::UpstreamUnavailable(e.to_string())
    }
}

impl From<DocumentError> for AppError {
    fn from(e: DocumentError) -> Self {
        let message = match &e {
            DocumentError::UnsupportedType(_) => "仅支持 PDF、DOC、DOCX 或 TXT 格式的简历".to_string(),
            DocumentError::TooLarge { limit, .. } => {
                format!("文件大小不能超过 {}MB", limit / (1024 * 1024))
            }
            DocumentError::Empty => "上传的文件为空".to_string(),
            DocumentError::Unreadable(reason) => format!("无法解析简历内容: {reason}"),
        };
        AppError::invalid_with_code(e.code(), message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details): (StatusCode, &str, String, Option<String>) =
            match &self {
                AppError::Unauthorized => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "请先登录".to_string(),
                    None,
                ),
                AppError::MissingField(field) => (
                    StatusCode::BAD_REQUEST,
                    "MISSING_FIELD",
                    format!("缺少必填字段: {field}"),
                    None,
                ),
                AppError::InvalidInput { code, message } => {
                    (StatusCode::BAD_REQUEST, *code, message.clone(), None)
                }
                AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
                AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
                AppError::UpstreamUnavailable(msg) => {
                    tracing::error!("Upstream LLM error: {msg}");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "UPSTREAM_UNAVAILABLE",
                        "AI服务暂时不可用，请稍后重试".to_string(),
                        Some(msg.clone()),
                    )
                }
                AppError::Database(e) => database_error_parts(e),
                AppError::Internal(e) => {
                    tracing::error!("Internal error: {e:?}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "服务器内部错误".to_string(),
                        None,
                    )
                }
            };

        (status, Json(error_body(message, code, details))).into_response()
    }
}

fn database_error_parts(e: &sqlx::Error) -> (StatusCode, &'static str, String, Option<String>) {
    match e {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "记录不存在".to_string(),
            None,
        ),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "记录已存在".to_string(),
            None,
        ),
        _ => {
            tracing::error!("Database error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "数据库错误".to_string(),
                None,
            )
        }
    }
}

fn error_body(message: String, code: &str, details: Option<String>) -> Value {
    let mut body = json!({ "error": message, "type": code });
    if let Some(details) = details {
        body["details"] = Value::String(details);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_401() {
        let (status, body) = render(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], "UNAUTHORIZED");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_code() {
        let (status, body) =
            render(AppError::invalid_with_code("FILE_TOO_LARGE", "文件过大")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "FILE_TOO_LARGE");
        assert_eq!(body["error"], "文件过大");
    }

    #[tokio::test]
    async fn test_row_not_found_maps_to_404() {
        let (status, _) = render(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_document_errors_keep_their_codes() {
        let err: AppError = DocumentError::TooLarge {
            limit: 10 * 1024 * 1024,
            actual: 11 * 1024 * 1024,
        }
        .into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "FILE_TOO_LARGE");
        assert!(body["error"].as_str().unwrap().contains("10MB"));
    }

    #[tokio::test]
    async fn test_upstream_carries_details() {
        let err: AppError = LlmError::Timeout { seconds: 30 }.into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["details"].as_str().unwrap().contains("30"));
    }
}
