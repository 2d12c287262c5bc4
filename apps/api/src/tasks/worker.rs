use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::interview::{best_answers, report, repo as interview_repo};
use crate::models::task::BackgroundTaskRow;
use crate::resume::service;
use crate::state::AppState;
use crate::tasks::{queue, Task};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(state))
}

/// Polls `background_tasks` forever, draining every due task on each tick.
pub async fn run(state: AppState) {
    if let Err(e) = queue::recover_interrupted(&state.db).await {
        error!("Could not recover interrupted tasks: {e}");
    }
    info!("Background worker started");

    let mut ticker = interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        loop {
            match queue::claim_next(&state.db).await {
                Ok(Some(task)) => process(&state, task).await,
                Ok(None) => break,
                Err(e) => {
                    error!("Claiming background task failed: {e}");
                    break;
                }
            }
        }
    }
}

async fn process(state: &AppState, row: BackgroundTaskRow) {
    let outcome = match Task::from_parts(&row.kind, &row.payload) {
        Some(task) => execute(state, task).await,
        None => Err(anyhow::anyhow!("unknown task kind or payload: {}", row.kind)),
    };

    let recorded = match &outcome {
        Ok(()) => {
            info!("Task {} ({}) succeeded", row.id, row.kind);
            queue::mark_succeeded(&state.db, row.id).await
        }
        Err(e) => {
            warn!(
                "Task {} ({}) failed on attempt {}: {e:#}",
                row.id, row.kind, row.attempts
            );
            queue::mark_failed(&state.db, &row, &format!("{e:#}")).await
        }
    };
    if let Err(e) = recorded {
        error!("Could not record outcome of task {}: {e}", row.id);
    }
}

async fn execute(state: &AppState, task: Task) -> anyhow::Result<()> {
    match task {
        Task::BestAnswers { interview_id } => {
            best_answers::backfill_interview(&state.db, state.llm.as_ref(), interview_id).await?;
        }
        Task::ResumeAnalysis { resume_id } => {
            service::retry_llm_analysis(state, resume_id).await?;
        }
        Task::InterviewReport { interview_id } => {
            let interview = interview_repo::find_interview_by_id(&state.db, interview_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("interview {interview_id} no longer exists"))?;
            report::generate_and_store(state, &interview).await?;
        }
    }
    Ok(())
}
