//! Résumé and AI-profile persistence.

use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::analysis::profile::{
    AiProfile, Complexity, ExperienceLevel, Proficiency, ProjectAnalysis, SimulatedInterview,
    TechCategory, TechStackItem,
};
use crate::analysis::AnalysisOutcome;
use crate::document::BasicAnalysis;
use crate::models::profile::{AiProfileRow, ProjectAnalysisRow, TechStackItemRow};
use crate::models::resume::ResumeRow;

pub async fn insert_resume(
    pool: &PgPool,
    user_id: Uuid,
    file_name: &str,
    raw_parsed_content: &Value,
    basic: &BasicAnalysis,
) -> Result<ResumeRow, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>(
        r#"
        INSERT INTO resumes
            (id, user_id, file_name, raw_parsed_content, tech_keywords, projects, work_experience)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(file_name)
    .bind(raw_parsed_content)
    .bind(&basic.tech_keywords)
    .bind(Json(&basic.projects))
    .bind(Json(&basic.work_experience))
    .fetch_one(pool)
    .await
}

/// Multiple résumés may exist per user; the newest one is "the" résumé.
pub async fn latest_resume_for_user(pool: &PgPool, user_id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Owner-checked lookup.
pub async fn find_resume(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Unchecked lookup for background tasks, which carry no session.
pub async fn find_resume_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Creates or replaces the profile of a résumé. Child rows are deleted and
/// recreated, never merged; the whole replacement is one transaction.
pub async fn upsert_ai_profile(
    pool: &PgPool,
    resume_id: Uuid,
    outcome: &AnalysisOutcome,
) -> Result<Uuid, sqlx::Error> {
    let profile = &outcome.profile;
    let mut tx = pool.begin().await?;

    let profile_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO ai_profiles
            (id, resume_id, experience_level, experience_level_confidence, specializations,
             tech_highlights, career_suggestions, role_matching_analysis, skill_assessment,
             simulated_interview, raw_analysis, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (resume_id) DO UPDATE SET
            experience_level = EXCLUDED.experience_level,
            experience_level_confidence = EXCLUDED.experience_level_confidence,
            specializations = EXCLUDED.specializations,
            tech_highlights = EXCLUDED.tech_highlights,
            career_suggestions = EXCLUDED.career_suggestions,
            role_matching_analysis = EXCLUDED.role_matching_analysis,
            skill_assessment = EXCLUDED.skill_assessment,
            simulated_interview = EXCLUDED.simulated_interview,
            raw_analysis = EXCLUDED.raw_analysis,
            source = EXCLUDED.source,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(resume_id)
    .bind(profile.experience_level.as_str())
    .bind(profile.experience_level_confidence)
    .bind(&profile.specializations)
    .bind(&profile.tech_highlights)
    .bind(&profile.career_suggestions)
    .bind(Json(&profile.role_matching_analysis))
    .bind(Json(&profile.skill_assessment))
    .bind(profile.simulated_interview.as_ref().map(Json))
    .bind(&outcome.raw)
    .bind(outcome.source.as_str())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM tech_stack_items WHERE profile_id = $1")
        .bind(profile_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM project_analyses WHERE profile_id = $1")
        .bind(profile_id)
        .execute(&mut *tx)
        .await?;

    for item in &profile.tech_stack {
        sqlx::query(
            r#"
            INSERT INTO tech_stack_items
                (id, profile_id, technology, category, proficiency, value_score, evidence_count, last_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(profile_id)
        .bind(&item.technology)
        .bind(item.category.label())
        .bind(item.proficiency.as_str())
        .bind(item.value_score)
        .bind(item.evidence_count)
        .bind(&item.last_used)
        .execute(&mut *tx)
        .await?;
    }

    for project in &profile.project_analysis {
        sqlx::query(
            r#"
            INSERT INTO project_analyses
                (id, profile_id, project_name, description, tech_stack, complexity,
                 impact, role, highlights, interview_questions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(profile_id)
        .bind(&project.project_name)
        .bind(&project.description)
        .bind(&project.tech_stack)
        .bind(project.complexity.as_str())
        .bind(&project.impact)
        .bind(&project.role)
        .bind(&project.highlights)
        .bind(&project.interview_questions)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(profile_id)
}

/// A persisted profile: the row (for metadata) plus the typed view.
#[derive(Debug, Clone)]
pub struct StoredProfile {
    pub row: AiProfileRow,
    pub profile: AiProfile,
}

pub async fn load_ai_profile(pool: &PgPool, resume_id: Uuid) -> Result<Option<StoredProfile>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, AiProfileRow>("SELECT * FROM ai_profiles WHERE resume_id = $1")
        .bind(resume_id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let tech_rows = sqlx::query_as::<_, TechStackItemRow>(
        "SELECT * FROM tech_stack_items WHERE profile_id = $1 ORDER BY value_score DESC",
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    let project_rows = sqlx::query_as::<_, ProjectAnalysisRow>(
        "SELECT * FROM project_analyses WHERE profile_id = $1",
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    let profile = assemble_profile(&row, tech_rows, project_rows);
    Ok(Some(StoredProfile { row, profile }))
}

fn assemble_profile(
    row: &AiProfileRow,
    tech_rows: Vec<TechStackItemRow>,
    project_rows: Vec<ProjectAnalysisRow>,
) -> AiProfile {
    AiProfile {
        experience_level: ExperienceLevel::parse(&row.experience_level).unwrap_or_default(),
        experience_level_confidence: row.experience_level_confidence,
        specializations: row.specializations.clone(),
        tech_stack: tech_rows
            .into_iter()
            .map(|t| TechStackItem {
                category: TechCategory::parse(&t.category),
                proficiency: Proficiency::parse(&t.proficiency),
                technology: t.technology,
                value_score: t.value_score,
                evidence_count: t.evidence_count,
                last_used: t.last_used,
            })
            .collect(),
        project_analysis: project_rows
            .into_iter()
            .map(|p| ProjectAnalysis {
                complexity: Complexity::parse(&p.complexity),
                project_name: p.project_name,
                description: p.description,
                tech_stack: p.tech_stack,
                impact: p.impact,
                role: p.role,
                highlights: p.highlights,
                interview_questions: p.interview_questions,
            })
            .collect(),
        tech_highlights: row.tech_highlights.clone(),
        career_suggestions: row.career_suggestions.clone(),
        role_matching_analysis: serde_json::from_value(row.role_matching_analysis.clone())
            .unwrap_or_default(),
        skill_assessment: serde_json::from_value(row.skill_assessment.clone()).unwrap_or_default(),
        simulated_interview: row
            .simulated_interview
            .as_ref()
            .and_then(SimulatedInterview::from_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn row() -> AiProfileRow {
        AiProfileRow {
            id: Uuid::new_v4(),
            resume_id: Uuid::new_v4(),
            experience_level: "senior".to_string(),
            experience_level_confidence: 0.8,
            specializations: vec!["后端开发".to_string()],
            tech_highlights: vec![],
            career_suggestions: vec![],
            role_matching_analysis: json!({"后端工程师": 90.0}),
            skill_assessment: json!({}),
            simulated_interview: Some(json!({"algorithms": ["两数之和"]})),
            raw_analysis: json!({}),
            source: "llm".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_profile_parses_stored_labels() {
        let row = row();
        let tech = vec![TechStackItemRow {
            id: Uuid::new_v4(),
            profile_id: row.id,
            technology: "PostgreSQL".to_string(),
            category: "数据库".to_string(),
            proficiency: "senior".to_string(),
            value_score: 88,
            evidence_count: 2,
            last_used: "2024".to_string(),
        }];
        let profile = assemble_profile(&row, tech, vec![]);
        assert_eq!(profile.experience_level, ExperienceLevel::Senior);
        assert_eq!(profile.tech_stack[0].category, TechCategory::Database);
        assert_eq!(profile.role_matching_analysis["后端工程师"], 90.0);
        assert_eq!(profile.simulated_interview.unwrap().total_questions(), 1);
    }

    #[test]
    fn test_missing_bank_stays_none() {
        let mut row = row();
        row.simulated_interview = None;
        assert!(assemble_profile(&row, vec![], vec![]).simulated_interview.is_none());
    }
}
