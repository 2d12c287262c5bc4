use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::preferences::PreferenceInput;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub id: Option<Uuid>,
}

/// POST /api/job-preference
pub async fn handle_save_preference(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<PreferenceInput>,
) -> Result<Json<Value>, AppError> {
    if input.position.trim().is_empty() {
        return Err(AppError::MissingField("position".to_string()));
    }
    let saved = state.preferences.save(user.id, input).await?;
    info!(
        "Saved job preference {} for user {} (default={})",
        saved.id, user.id, saved.is_default
    );
    Ok(Json(json!({ "success": true, "data": saved })))
}

/// GET /api/job-preference
pub async fn handle_list_preferences(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let preferences = state.preferences.list(user.id).await?;
    let default = preferences.iter().find(|p| p.is_default).cloned();
    Ok(Json(json!({
        "success": true,
        "data": { "preferences": preferences, "default": default }
    })))
}

/// DELETE /api/job-preference?id=
pub async fn handle_delete_preference(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    let id = query.id.ok_or_else(|| AppError::MissingField("id".to_string()))?;
    if !state.preferences.delete(user.id, id).await? {
        return Err(AppError::NotFound("岗位偏好不存在".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
