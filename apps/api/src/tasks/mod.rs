//! Durable background tasks.
//!
//! Work that used to be fire-and-forget (best-answer backfill, LLM re-analysis of
//! a résumé, report generation) is recorded in `background_tasks` first and
//! executed by a single polling worker, so a restart never drops it.

pub mod queue;
pub mod worker;

use serde_json::{json, Value};
use uuid::Uuid;

pub use queue::enqueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    BestAnswers { interview_id: Uuid },
    ResumeAnalysis { resume_id: Uuid },
    InterviewReport { interview_id: Uuid },
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::BestAnswers { .. } => "best_answers",
            Task::ResumeAnalysis { .. } => "resume_analysis",
            Task::InterviewReport { .. } => "interview_report",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Task::BestAnswers { interview_id } | Task::InterviewReport { interview_id } => {
                json!({ "interview_id": interview_id })
            }
            Task::ResumeAnalysis { resume_id } => json!({ "resume_id": resume_id }),
        }
    }

    /// Rebuilds a task from its stored row; `None` for unknown kinds or bad payloads.
    pub fn from_parts(kind: &str, payload: &Value) -> Option<Self> {
        let id = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
        };
        match kind {
            "best_answers" => id("interview_id").map(|interview_id| Task::BestAnswers { interview_id }),
            "resume_analysis" => id("resume_id").map(|resume_id| Task::ResumeAnalysis { resume_id }),
            "interview_report" => {
                id("interview_id").map(|interview_id| Task::InterviewReport { interview_id })
            }
            _ => None,
        }
    }
}
