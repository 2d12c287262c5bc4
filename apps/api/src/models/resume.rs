use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    /// `{ text, sensitiveInfo, removedFields }` as produced at upload time.
    pub raw_parsed_content: Value,
    pub tech_keywords: Vec<String>,
    pub projects: Value,
    pub work_experience: Value,
    pub created_at: DateTime<Utc>,
}

impl ResumeRow {
    /// The privacy-filtered text stored at upload; empty when the blob is malformed.
    pub fn filtered_text(&self) -> &str {
        self.raw_parsed_content
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}
