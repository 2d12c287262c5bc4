use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Literal written to `questions.model_answer` when best-answer generation fails.
pub const MODEL_ANSWER_FAILED: &str = "最佳答案生成失败，请稍后重试";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewStatus {
    InProgress,
    Completed,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::InProgress => "in-progress",
            InterviewStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewType {
    #[default]
    Technical,
    Behavioral,
    SystemDesign,
}

impl InterviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewType::Technical => "technical",
            InterviewType::Behavioral => "behavioral",
            InterviewType::SystemDesign => "system-design",
        }
    }

    /// Round type used for the single round an interview of this type starts with.
    pub fn first_round(&self) -> RoundType {
        match self {
            InterviewType::Technical => RoundType::Coding,
            InterviewType::Behavioral => RoundType::Behavioral,
            InterviewType::SystemDesign => RoundType::SystemDesign,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundType {
    Coding,
    Behavioral,
    SystemDesign,
}

impl RoundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundType::Coding => "coding",
            RoundType::Behavioral => "behavioral",
            RoundType::SystemDesign => "system-design",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    Coding,
    Algorithm,
    #[default]
    TechnicalKnowledge,
    Behavioral,
    SystemDesign,
    Scenario,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Coding => "coding",
            QuestionType::Algorithm => "algorithm",
            QuestionType::TechnicalKnowledge => "technical-knowledge",
            QuestionType::Behavioral => "behavioral",
            QuestionType::SystemDesign => "system-design",
            QuestionType::Scenario => "scenario",
        }
    }

    /// Unknown labels read as technical-knowledge.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace('_', "-").as_str() {
            "coding" | "编程" => QuestionType::Coding,
            "algorithm" | "algorithms" | "算法" => QuestionType::Algorithm,
            "behavioral" | "behavior" | "行为" => QuestionType::Behavioral,
            "system-design" | "systemdesign" | "architecture" | "系统设计" => QuestionType::SystemDesign,
            "scenario" | "project" | "场景" => QuestionType::Scenario,
            _ => QuestionType::TechnicalKnowledge,
        }
    }

    pub fn is_technical(&self) -> bool {
        matches!(
            self,
            QuestionType::Coding | QuestionType::Algorithm | QuestionType::TechnicalKnowledge
        )
    }

    pub fn is_communication(&self) -> bool {
        matches!(self, QuestionType::Behavioral | QuestionType::Scenario)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "easy" | "简单" => Difficulty::Easy,
            "hard" | "困难" | "难" => Difficulty::Hard,
            "expert" | "专家" => Difficulty::Expert,
            _ => Difficulty::Medium,
        }
    }
}

/// Where a question came from. Set once at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSource {
    Generated,
    Bank,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::Generated => "generated",
            QuestionSource::Bank => "bank",
        }
    }
}

/// The three states of `questions.model_answer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAnswer {
    /// Not attempted yet; not an error.
    Pending,
    Ready(String),
    /// Generation was attempted and failed; the column holds `MODEL_ANSWER_FAILED`.
    Failed,
}

impl ModelAnswer {
    pub fn from_column(column: Option<&str>) -> Self {
        match column {
            None => ModelAnswer::Pending,
            Some(MODEL_ANSWER_FAILED) => ModelAnswer::Failed,
            Some(text) if text.trim().is_empty() => ModelAnswer::Pending,
            Some(text) => ModelAnswer::Ready(text.to_string()),
        }
    }

    pub fn state(&self) -> &'static str {
        match self {
            ModelAnswer::Pending => "pending",
            ModelAnswer::Ready(_) => "ready",
            ModelAnswer::Failed => "failed",
        }
    }
}

impl Serialize for ModelAnswer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ModelAnswer", 2)?;
        s.serialize_field("state", self.state())?;
        match self {
            ModelAnswer::Ready(text) => s.serialize_field("content", text)?,
            _ => s.serialize_field("content", &Option::<String>::None)?,
        }
        s.end()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_position_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub interview_type: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InterviewRow {
    pub fn is_completed(&self) -> bool {
        self.status == InterviewStatus::Completed.as_str()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoundRow {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub round_number: i32,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub round_type: String,
    pub score: Option<f64>,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRow {
    pub id: Uuid,
    pub round_id: Uuid,
    pub position: i32,
    pub content: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: String,
    pub difficulty: String,
    pub category: String,
    pub source: String,
    pub user_answer: Option<String>,
    pub model_answer: Option<String>,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub follow_ups: Vec<String>,
}

impl QuestionRow {
    pub fn kind(&self) -> QuestionType {
        QuestionType::parse(&self.question_type)
    }

    pub fn model_answer_state(&self) -> ModelAnswer {
        ModelAnswer::from_column(self.model_answer.as_deref())
    }

    /// Answered and scored; the round-completion predicate is built on this.
    pub fn is_evaluated(&self) -> bool {
        self.user_answer.is_some() && self.score.is_some()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub overall_score: f64,
    pub technical_score: f64,
    pub communication_score: f64,
    pub system_design_score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub detailed_analysis: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn interview(status: InterviewStatus) -> InterviewRow {
    InterviewRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        job_position_id: None,
        interview_type: InterviewType::Technical.as_str().to_string(),
        status: status.as_str().to_string(),
        started_at: Some(Utc::now()),
        completed_at: None,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
pub(crate) fn question(position: i32, question_type: QuestionType) -> QuestionRow {
    QuestionRow {
        id: Uuid::new_v4(),
        round_id: Uuid::nil(),
        position,
        content: format!("问题 {position}"),
        question_type: question_type.as_str().to_string(),
        difficulty: Difficulty::Medium.as_str().to_string(),
        category: String::new(),
        source: QuestionSource::Generated.as_str().to_string(),
        user_answer: None,
        model_answer: None,
        score: None,
        feedback: None,
        follow_ups: Vec::new(),
    }
}
