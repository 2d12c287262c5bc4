use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::interview::generation::{self, GenerateRequest, Generated};
use crate::interview::{evaluation, repo, report, report_html};
use crate::models::interview::{InterviewRow, QuestionRow};
use crate::state::AppState;
use crate::tasks::{self, Task};

fn question_json(q: &QuestionRow) -> Value {
    json!({
        "id": q.id,
        "roundId": q.round_id,
        "position": q.position,
        "content": q.content,
        "type": q.question_type,
        "difficulty": q.difficulty,
        "category": q.category,
        "source": q.source,
        "userAnswer": q.user_answer,
        "score": q.score,
        "feedback": q.feedback,
        "followUps": q.follow_ups,
        "modelAnswer": q.model_answer_state(),
    })
}

fn generated_json(state: &AppState, generated: &Generated) -> Json<Value> {
    let created = &generated.created;
    Json(json!({
        "success": true,
        "data": {
            "interviewId": created.interview.id,
            "roundId": created.round.id,
            "type": created.interview.interview_type,
            "source": generated.source,
            "durationMinutes": state.config.interview_duration_minutes(),
            "questions": created.questions.iter().map(question_json).collect::<Vec<_>>(),
        }
    }))
}

async fn owned_interview(state: &AppState, user_id: Uuid, id: Option<Uuid>) -> Result<InterviewRow, AppError> {
    let id = id.ok_or_else(|| AppError::MissingField("interviewId".to_string()))?;
    repo::find_interview(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("面试不存在".to_string()))
}

/// POST /api/interview/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let generated = generation::generate_from_bank(&state, user.id, &request).await?;
    Ok(generated_json(&state, &generated))
}

/// POST /api/interview/generate-realtime
pub async fn handle_generate_realtime(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let generated = generation::generate_realtime(&state, user.id, &request).await?;
    Ok(generated_json(&state, &generated))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub question_id: Option<Uuid>,
    pub answer: Option<String>,
}

/// POST /api/interview/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<EvaluateRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let question_id = request
        .question_id
        .ok_or_else(|| AppError::MissingField("questionId".to_string()))?;
    let answer = request
        .answer
        .ok_or_else(|| AppError::MissingField("answer".to_string()))?;

    let submission = evaluation::submit_answer(&state, user.id, question_id, &answer).await?;
    Ok(Json(json!({ "success": true, "data": submission })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRef {
    pub interview_id: Option<Uuid>,
}

/// POST /api/interview/generate-best-answers: queues a backfill and returns at once.
pub async fn handle_generate_best_answers(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<InterviewRef>>,
) -> Result<Json<Value>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let interview = owned_interview(&state, user.id, request.interview_id).await?;

    let pending = repo::questions_missing_model_answer(&state.db, interview.id).await?;
    if !pending.is_empty() {
        tasks::enqueue(
            &state.db,
            Task::BestAnswers {
                interview_id: interview.id,
            },
        )
        .await?;
    }
    Ok(Json(json!({
        "success": true,
        "data": { "interviewId": interview.id, "queued": pending.len() }
    })))
}

/// POST /api/interview/report: returns the stored report or builds it now.
pub async fn handle_report(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<InterviewRef>>,
) -> Result<Json<Value>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let interview = owned_interview(&state, user.id, request.interview_id).await?;

    let questions = repo::questions_for_interview(&state.db, interview.id).await?;
    if !questions.iter().any(|q| q.score.is_some()) {
        return Err(AppError::invalid_with_code("NO_ANSWERS", "请至少完成一道题目后再生成报告"));
    }

    if repo::complete_interview(&state.db, interview.id).await? {
        info!("Interview {} completed by report request", interview.id);
    }
    let interview = repo::find_interview_by_id(&state.db, interview.id)
        .await?
        .ok_or_else(|| AppError::NotFound("面试不存在".to_string()))?;
    let report = report::generate_and_store(&state, &interview).await?;
    Ok(Json(json!({ "success": true, "data": report })))
}

fn html_attachment(file_name: &str, html: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        html,
    )
        .into_response()
}

/// GET /api/interview/download-report?interviewId=
pub async fn handle_download_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<InterviewRef>,
) -> Result<Response, AppError> {
    let interview = owned_interview(&state, user.id, query.interview_id).await?;
    let report = report::current_report(&state, &interview).await?;
    let questions = repo::questions_for_interview(&state.db, interview.id).await?;
    let position = report::position_for(&state, &interview).await?;

    let html = report_html::render_report(&position, &interview, &report, &questions);
    Ok(html_attachment(&format!("interview-report-{}.html", interview.id), html))
}

/// POST /api/dashboard/download-all-reports
pub async fn handle_download_all_reports(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, AppError> {
    let entries = repo::reports_for_user(&state.db, user.id).await?;
    if entries.is_empty() {
        warn!("User {} requested all reports but has none", user.id);
    }
    let html = report_html::render_all_reports(&entries);
    Ok(html_attachment("interview-reports.html", html))
}

/// GET /api/interview/:id
pub async fn handle_interview_detail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let interview = owned_interview(&state, user.id, Some(id)).await?;
    let rounds = repo::rounds_for_interview(&state.db, interview.id).await?;
    let questions = repo::questions_for_interview(&state.db, interview.id).await?;
    let report = repo::find_report(&state.db, interview.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "interview": interview,
            "rounds": rounds,
            "questions": questions.iter().map(question_json).collect::<Vec<_>>(),
            "report": report,
        }
    })))
}
