use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisOutcome, AnalysisSource, ResumeAnalyzer};
use crate::document::BasicAnalysis;
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::resume::repo;
use crate::state::AppState;
use crate::tasks::{self, Task};

/// A fallback result never replaces a stored LLM profile.
pub fn keeps_stored_profile(stored_source: Option<&str>, fresh: AnalysisSource) -> bool {
    fresh == AnalysisSource::Fallback && stored_source == Some(AnalysisSource::Llm.as_str())
}

/// Runs analysis over a stored résumé and persists the resulting profile.
/// When the LLM path fell back, a `resume_analysis` task is queued to retry it.
pub async fn analyze_and_store(state: &AppState, resume: &ResumeRow) -> Result<AnalysisOutcome, AppError> {
    let outcome = run_analysis(state, resume).await;

    let stored = repo::load_ai_profile(&state.db, resume.id).await?;
    if let Some(stored) = stored {
        if keeps_stored_profile(Some(&stored.row.source), outcome.source) {
            warn!(
                "LLM analysis of resume {} fell back; keeping the stored LLM profile",
                resume.id
            );
            return Ok(AnalysisOutcome {
                profile: stored.profile,
                source: AnalysisSource::Llm,
                raw: stored.row.raw_analysis,
            });
        }
    }

    repo::upsert_ai_profile(&state.db, resume.id, &outcome).await?;
    info!(
        "Stored {} AI profile for resume {}",
        outcome.source.as_str(),
        resume.id
    );

    if outcome.source == AnalysisSource::Fallback {
        if let Err(e) = tasks::enqueue(&state.db, Task::ResumeAnalysis { resume_id: resume.id }).await {
            warn!("Could not queue LLM re-analysis for resume {}: {e}", resume.id);
        }
    }
    Ok(outcome)
}

/// Background retry of the LLM path. Errors when the LLM still fails so the
/// task is retried; an existing LLM profile is never overwritten by a fallback.
pub async fn retry_llm_analysis(state: &AppState, resume_id: Uuid) -> anyhow::Result<()> {
    let resume = repo::find_resume_by_id(&state.db, resume_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("resume {resume_id} no longer exists"))?;

    if let Some(stored) = repo::load_ai_profile(&state.db, resume_id).await? {
        if keeps_stored_profile(Some(&stored.row.source), AnalysisSource::Fallback) {
            info!("Resume {resume_id} already has an LLM profile; nothing to retry");
            return Ok(());
        }
    }

    let outcome = run_analysis(state, &resume).await;
    if outcome.source != AnalysisSource::Llm {
        anyhow::bail!("LLM analysis still unavailable for resume {resume_id}");
    }
    repo::upsert_ai_profile(&state.db, resume_id, &outcome).await?;
    info!("Replaced fallback profile of resume {resume_id} with LLM analysis");
    Ok(())
}

async fn run_analysis(state: &AppState, resume: &ResumeRow) -> AnalysisOutcome {
    let basic = basic_analysis_of(resume);
    ResumeAnalyzer::new(state.llm.as_ref())
        .analyze(resume.filtered_text(), &basic)
        .await
}

pub fn basic_analysis_of(resume: &ResumeRow) -> BasicAnalysis {
    BasicAnalysis {
        tech_keywords: resume.tech_keywords.clone(),
        projects: serde_json::from_value(resume.projects.clone()).unwrap_or_default(),
        work_experience: serde_json::from_value(resume.work_experience.clone()).unwrap_or_default(),
    }
}

/// The `aiAnalysis` block of upload and analyze responses.
pub fn ai_analysis_json(outcome: &AnalysisOutcome) -> Value {
    json!({
        "hasAIAnalysis": outcome.source == AnalysisSource::Llm,
        "source": outcome.source,
        "profile": outcome.profile,
    })
}
