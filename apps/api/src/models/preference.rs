use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobPreferenceRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub custom_company: Option<String>,
    pub position: String,
    pub level: String,
    pub requirements: Option<String>,
    pub job_responsibilities: Option<String>,
    pub job_requirements: Option<String>,
    pub is_default: bool,
    pub usage_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobPreferenceRow {
    /// The company name shown to the model: the custom name wins when set.
    pub fn display_company(&self) -> &str {
        self.custom_company
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.company)
    }
}
