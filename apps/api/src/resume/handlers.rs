use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::document::{self, DocumentKind};
use crate::errors::AppError;
use crate::privacy;
use crate::resume::{repo, service};
use crate::state::AppState;
use crate::tasks::{self, Task};

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_with_code("INVALID_FORM", format!("表单解析失败: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("resume").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid_with_code("INVALID_FORM", format!("文件读取失败: {e}")))?;
        return Ok(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }
    Err(AppError::invalid_with_code("MISSING_FILE", "请选择要上传的简历文件"))
}

/// POST /api/resume/upload
///
/// parse → privacy filter → basic extraction → persist → analysis. Analysis
/// never fails the upload: a fallback profile is stored and the LLM retried later.
pub async fn handle_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let file = read_file_field(&mut multipart).await?;
    let kind = DocumentKind::detect(file.content_type.as_deref(), &file.file_name)?;
    document::validate_upload(file.data.len(), state.config.upload_max_size)?;
    info!(
        "User {} uploading {} ({:?}, {} bytes)",
        user.id,
        file.file_name,
        kind,
        file.data.len()
    );

    let data = file.data.clone();
    let text = tokio::task::spawn_blocking(move || document::parse_document(&data, kind))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("document parser task failed: {e}")))??;

    let filtered = privacy::filter(&text);
    if !filtered.removed_fields.is_empty() {
        info!("Redacted {:?} from uploaded resume", filtered.removed_fields);
    }
    let basic = document::extract_basic_info(&filtered.filtered_text);

    let raw_parsed_content = json!({
        "text": filtered.filtered_text,
        "sensitiveInfo": filtered.sensitive_info,
        "removedFields": filtered.removed_fields,
    });
    let resume = repo::insert_resume(&state.db, user.id, &file.file_name, &raw_parsed_content, &basic).await?;

    let ai_analysis = match service::analyze_and_store(&state, &resume).await {
        Ok(outcome) => service::ai_analysis_json(&outcome),
        Err(e) => {
            warn!("Storing AI profile for resume {} failed: {e}", resume.id);
            if let Err(e) = tasks::enqueue(&state.db, Task::ResumeAnalysis { resume_id: resume.id }).await {
                warn!("Could not queue re-analysis for resume {}: {e}", resume.id);
            }
            json!({ "hasAIAnalysis": false })
        }
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "resumeId": resume.id,
            "fileName": resume.file_name,
            "basicAnalysis": basic,
            "aiAnalysis": ai_analysis,
            "privacy": {
                "removedFields": filtered.removed_fields,
                "sensitiveInfo": filtered.sensitive_info,
            },
        }
    })))
}

/// GET /api/resume/check
pub async fn handle_check(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let Some(resume) = repo::latest_resume_for_user(&state.db, user.id).await? else {
        return Ok(Json(json!({ "success": true, "data": { "hasResume": false } })));
    };
    let profile = repo::load_ai_profile(&state.db, resume.id).await?;
    let bank_size = profile
        .as_ref()
        .and_then(|p| p.profile.simulated_interview.as_ref())
        .map_or(0, |bank| bank.total_questions());

    Ok(Json(json!({
        "success": true,
        "data": {
            "hasResume": true,
            "resume": {
                "id": resume.id,
                "fileName": resume.file_name,
                "createdAt": resume.created_at,
                "techKeywords": resume.tech_keywords,
                "projects": resume.projects,
                "workExperience": resume.work_experience,
            },
            "hasAIProfile": profile.is_some(),
            "hasQuestionBank": bank_size > 0,
            "questionBankSize": bank_size,
        }
    })))
}

/// GET /api/resume/ai-profile/:resumeId
pub async fn handle_ai_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    repo::find_resume(&state.db, user.id, resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound("简历不存在".to_string()))?;

    let Some(stored) = repo::load_ai_profile(&state.db, resume_id).await? else {
        return Ok(Json(json!({ "success": true, "data": { "hasAIProfile": false } })));
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "hasAIProfile": true,
            "source": stored.row.source,
            "updatedAt": stored.row.updated_at,
            "profile": stored.profile,
        }
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub resume_id: Option<Uuid>,
}

/// POST /api/resume/analyze: re-runs analysis over a stored résumé (latest when no id).
pub async fn handle_analyze(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let resume = match request.resume_id {
        Some(id) => repo::find_resume(&state.db, user.id, id).await?,
        None => repo::latest_resume_for_user(&state.db, user.id).await?,
    }
    .ok_or_else(|| AppError::NotFound("请先上传简历".to_string()))?;

    let outcome = service::analyze_and_store(&state, &resume).await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "resumeId": resume.id,
            "aiAnalysis": service::ai_analysis_json(&outcome),
        }
    })))
}
