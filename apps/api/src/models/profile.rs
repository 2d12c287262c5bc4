use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiProfileRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub experience_level: String,
    pub experience_level_confidence: f64,
    pub specializations: Vec<String>,
    pub tech_highlights: Vec<String>,
    pub career_suggestions: Vec<String>,
    pub role_matching_analysis: Value,
    pub skill_assessment: Value,
    pub simulated_interview: Option<Value>,
    pub raw_analysis: Value,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TechStackItemRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub technology: String,
    pub category: String,
    pub proficiency: String,
    pub value_score: i32,
    pub evidence_count: i32,
    pub last_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectAnalysisRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub project_name: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub complexity: String,
    pub impact: String,
    pub role: String,
    pub highlights: Vec<String>,
    pub interview_questions: Vec<String>,
}
