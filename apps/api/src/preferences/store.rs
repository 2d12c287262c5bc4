//! Job preference persistence behind a pluggable store.
//!
//! `AppState` holds an `Arc<dyn PreferenceStore>`; handlers and interview
//! generation never touch the table directly.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::preference::JobPreferenceRow;

/// Partial unique index allowing one default preference per user.
const SINGLE_DEFAULT_INDEX: &str = "user_job_preferences_one_default";

/// A concurrent default save that lost the race surfaces as `Conflict`.
fn save_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.constraint() == Some(SINGLE_DEFAULT_INDEX) => {
            AppError::Conflict("默认岗位偏好已被同时修改，请刷新后重试".to_string())
        }
        _ => AppError::from(e),
    }
}

/// Body of `POST /api/job-preference`. `id` present means update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceInput {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub company: String,
    pub custom_company: Option<String>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub level: String,
    pub requirements: Option<String>,
    pub job_responsibilities: Option<String>,
    pub job_requirements: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Default first, then most recently used, then newest.
    async fn list(&self, user_id: Uuid) -> Result<Vec<JobPreferenceRow>, AppError>;

    async fn default_for(&self, user_id: Uuid) -> Result<Option<JobPreferenceRow>, AppError>;

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<JobPreferenceRow>, AppError>;

    /// Insert or update. Saving with `is_default` clears every other default of
    /// the user in the same unit of work. Updating a row the user does not own is `NotFound`.
    async fn save(&self, user_id: Uuid, input: PreferenceInput) -> Result<JobPreferenceRow, AppError>;

    /// Returns `false` when no row owned by the user matched.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    /// Bumps `usage_count` and stamps `last_used_at`.
    async fn mark_used(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError>;
}

pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn list(&self, user_id: Uuid) -> Result<Vec<JobPreferenceRow>, AppError> {
        let rows = sqlx::query_as::<_, JobPreferenceRow>(
            r#"
            SELECT * FROM user_job_preferences
            WHERE user_id = $1
            ORDER BY is_default DESC, last_used_at DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn default_for(&self, user_id: Uuid) -> Result<Option<JobPreferenceRow>, AppError> {
        let row = sqlx::query_as::<_, JobPreferenceRow>(
            "SELECT * FROM user_job_preferences WHERE user_id = $1 AND is_default LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<JobPreferenceRow>, AppError> {
        let row = sqlx::query_as::<_, JobPreferenceRow>(
            "SELECT * FROM user_job_preferences WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn save(&self, user_id: Uuid, input: PreferenceInput) -> Result<JobPreferenceRow, AppError> {
        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            sqlx::query(
                "UPDATE user_job_preferences SET is_default = FALSE WHERE user_id = $1 AND id <> $2 AND is_default",
            )
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(save_error)?;
        }

        let saved = match input.id {
            Some(existing) => sqlx::query_as::<_, JobPreferenceRow>(
                r#"
                UPDATE user_job_preferences
                SET company = $3, custom_company = $4, position = $5, level = $6,
                    requirements = $7, job_responsibilities = $8, job_requirements = $9,
                    is_default = $10
                WHERE id = $1 AND user_id = $2
                RETURNING *
                "#,
            )
            .bind(existing)
            .bind(user_id)
            .bind(&input.company)
            .bind(&input.custom_company)
            .bind(&input.position)
            .bind(&input.level)
            .bind(&input.requirements)
            .bind(&input.job_responsibilities)
            .bind(&input.job_requirements)
            .bind(input.is_default)
            .fetch_optional(&mut *tx)
            .await
            .map_err(save_error)?
            .ok_or_else(|| AppError::NotFound("岗位偏好不存在".to_string()))?,
            None => sqlx::query_as::<_, JobPreferenceRow>(
                r#"
                INSERT INTO user_job_preferences
                    (id, user_id, company, custom_company, position, level,
                     requirements, job_responsibilities, job_requirements, is_default)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(&input.company)
            .bind(&input.custom_company)
            .bind(&input.position)
            .bind(&input.level)
            .bind(&input.requirements)
            .bind(&input.job_responsibilities)
            .bind(&input.job_requirements)
            .bind(input.is_default)
            .fetch_one(&mut *tx)
            .await
            .map_err(save_error)?,
        };

        tx.commit().await.map_err(save_error)?;
        Ok(saved)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_job_preferences WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_used(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE user_job_preferences
            SET usage_count = usage_count + 1, last_used_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    /// In-process store with the same default-clearing rule as the Postgres one.
    #[derive(Default)]
    pub struct MemoryPreferenceStore {
        rows: Mutex<Vec<JobPreferenceRow>>,
    }

    #[async_trait]
    impl PreferenceStore for MemoryPreferenceStore {
        async fn list(&self, user_id: Uuid) -> Result<Vec<JobPreferenceRow>, AppError> {
            let mut rows: Vec<JobPreferenceRow> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.is_default.cmp(&a.is_default));
            Ok(rows)
        }

        async fn default_for(&self, user_id: Uuid) -> Result<Option<JobPreferenceRow>, AppError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.user_id == user_id && r.is_default)
                .cloned())
        }

        async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<JobPreferenceRow>, AppError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.user_id == user_id && r.id == id)
                .cloned())
        }

        async fn save(&self, user_id: Uuid, input: PreferenceInput) -> Result<JobPreferenceRow, AppError> {
            let mut rows = self.rows.lock().unwrap();
            let id = input.id.unwrap_or_else(Uuid::new_v4);
            if input.id.is_some() && !rows.iter().any(|r| r.id == id && r.user_id == user_id) {
                return Err(AppError::NotFound("岗位偏好不存在".to_string()));
            }
            if input.is_default {
                for row in rows.iter_mut().filter(|r| r.user_id == user_id && r.id != id) {
                    row.is_default = false;
                }
            }
            let previous = rows.iter().position(|r| r.id == id).map(|i| rows.remove(i));
            let row = JobPreferenceRow {
                id,
                user_id,
                company: input.company,
                custom_company: input.custom_company,
                position: input.position,
                level: input.level,
                requirements: input.requirements,
                job_responsibilities: input.job_responsibilities,
                job_requirements: input.job_requirements,
                is_default: input.is_default,
                usage_count: previous.as_ref().map_or(0, |p| p.usage_count),
                last_used_at: previous.as_ref().and_then(|p| p.last_used_at),
                created_at: previous.map_or_else(Utc::now, |p| p.created_at),
            };
            rows.push(row.clone());
            Ok(row)
        }

        async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| !(r.id == id && r.user_id == user_id));
            Ok(rows.len() < before)
        }

        async fn mark_used(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|r| r.id == id && r.user_id == user_id) {
                row.usage_count += 1;
                row.last_used_at = Some(Utc::now());
            }
            Ok(())
        }
    }
}
