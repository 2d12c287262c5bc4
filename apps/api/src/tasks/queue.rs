use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::task::BackgroundTaskRow;
use crate::tasks::Task;

/// A task is attempted at most this many times before it is left `failed`.
pub const MAX_ATTEMPTS: i32 = 3;
/// Wait before the second attempt; doubles for each attempt after that.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(30);

pub async fn enqueue(pool: &PgPool, task: Task) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO background_tasks (id, kind, payload) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(task.kind())
        .bind(task.payload())
        .execute(pool)
        .await?;
    info!("Enqueued {} task {id}", task.kind());
    Ok(id)
}

/// Tasks left `running` by a previous process are made claimable again.
pub async fn recover_interrupted(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE background_tasks SET status = 'pending', updated_at = NOW() WHERE status = 'running'",
    )
    .execute(pool)
    .await?;
    if result.rows_affected() > 0 {
        warn!("Re-queued {} interrupted background tasks", result.rows_affected());
    }
    Ok(result.rows_affected())
}

/// Claims the oldest pending task that is due. Concurrent claimers skip rows already locked.
pub async fn claim_next(pool: &PgPool) -> Result<Option<BackgroundTaskRow>, sqlx::Error> {
    sqlx::query_as::<_, BackgroundTaskRow>(
        r#"
        UPDATE background_tasks
        SET status = 'running', attempts = attempts + 1, updated_at = NOW()
        WHERE id = (
            SELECT id FROM background_tasks
            WHERE status = 'pending' AND run_after <= NOW()
            ORDER BY created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        RETURNING *
        "#,
    )
    .fetch_optional(pool)
    .await
}

pub async fn mark_succeeded(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE background_tasks SET status = 'succeeded', last_error = NULL, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, task: &BackgroundTaskRow, error: &str) -> Result<(), sqlx::Error> {
    let delay = retry_delay(task.attempts);
    sqlx::query(
        r#"
        UPDATE background_tasks
        SET status = $2, last_error = $3, updated_at = NOW(),
            run_after = NOW() + $4 * INTERVAL '1 second'
        WHERE id = $1
        "#,
    )
    .bind(task.id)
    .bind(status_after_failure(task.attempts))
    .bind(error)
    .bind(delay.as_secs_f64())
    .execute(pool)
    .await?;
    if status_after_failure(task.attempts) == "pending" {
        info!("Task {} will be retried in {}s", task.id, delay.as_secs());
    }
    Ok(())
}

/// Exponential backoff: `attempts` counts the attempt that just failed.
pub fn retry_delay(attempts: i32) -> Duration {
    let exponent = attempts.clamp(1, 10) as u32 - 1;
    RETRY_BASE_DELAY * 2u32.pow(exponent)
}

/// `attempts` already counts the attempt that just failed.
pub fn status_after_failure(attempts: i32) -> &'static str {
    if attempts >= MAX_ATTEMPTS {
        "failed"
    } else {
        "pending"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_task_retries_until_max_attempts() {
        assert_eq!(status_after_failure(1), "pending");
        assert_eq!(status_after_failure(2), "pending");
        assert_eq!(status_after_failure(3), "failed");
    }

    #[test]
    fn test_retry_delay_backs_off_exponentially() {
        assert_eq!(retry_delay(1), Duration::from_secs(30));
        assert_eq!(retry_delay(2), Duration::from_secs(60));
        assert_eq!(retry_delay(3), Duration::from_secs(120));
        assert_eq!(retry_delay(0), RETRY_BASE_DELAY);
    }
}
