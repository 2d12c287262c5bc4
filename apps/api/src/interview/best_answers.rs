//! Model-answer backfill, run by the `best_answers` background task.

use std::time::Duration;

use futures::future::join_all;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::profile::str_field;
use crate::analysis::repair::parse_llm_json;
use crate::interview::prompts::build_best_answer_prompt;
use crate::interview::repo;
use crate::llm_client::{CompletionRequest, LlmBackend};
use crate::models::interview::{QuestionRow, MODEL_ANSWER_FAILED};

pub const BATCH_SIZE: usize = 3;
pub const BATCH_DELAY: Duration = Duration::from_millis(500);

/// Generates one model answer. Every failure becomes the placeholder, so the
/// question never stays `Pending` after an attempt.
async fn answer_one(llm: &dyn LlmBackend, question: &QuestionRow) -> String {
    let prompt = build_best_answer_prompt(question);
    match llm.complete(CompletionRequest::standard(prompt, 0.5, 2000)).await {
        Ok(reply) => {
            let answer = parse_llm_json(&reply)
                .map(|v| str_field(&v, "answer"))
                .unwrap_or_else(|| reply.trim().to_string());
            if answer.is_empty() {
                MODEL_ANSWER_FAILED.to_string()
            } else {
                answer
            }
        }
        Err(e) => {
            warn!("Best answer for question {} failed: {e}", question.id);
            MODEL_ANSWER_FAILED.to_string()
        }
    }
}

/// Answers one batch concurrently, in input order.
pub async fn answer_batch(llm: &dyn LlmBackend, batch: &[QuestionRow]) -> Vec<(Uuid, String)> {
    let answers = join_all(batch.iter().map(|q| answer_one(llm, q))).await;
    batch.iter().map(|q| q.id).zip(answers).collect()
}

/// Fills every missing model answer of an interview, batch by batch, writing
/// each batch before the next starts. Returns how many questions were written.
pub async fn backfill_interview(pool: &PgPool, llm: &dyn LlmBackend, interview_id: Uuid) -> anyhow::Result<usize> {
    let pending = repo::questions_missing_model_answer(pool, interview_id).await?;
    if pending.is_empty() {
        return Ok(0);
    }
    info!("Generating {} model answers for interview {interview_id}", pending.len());

    let mut written = 0;
    let mut failed = 0;
    for (i, batch) in pending.chunks(BATCH_SIZE).enumerate() {
        if i > 0 {
            tokio::time::sleep(BATCH_DELAY).await;
        }
        for (question_id, answer) in answer_batch(llm, batch).await {
            if answer == MODEL_ANSWER_FAILED {
                failed += 1;
            }
            repo::set_model_answer(pool, question_id, &answer).await?;
            written += 1;
        }
    }

    info!("Model answers for interview {interview_id}: {written} written, {failed} failed");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedLlm;
    use crate::models::interview::{question, QuestionType};

    #[tokio::test]
    async fn test_batch_keeps_order_and_marks_failures() {
        let llm = ScriptedLlm::new()
            .reply("{\"answer\": \"使用哈希表，O(n)\"}")
            .fail(429)
            .reply("直接给出的纯文本答案");
        let batch: Vec<QuestionRow> = (1..=3).map(|i| question(i, QuestionType::Algorithm)).collect();

        let results = answer_batch(&llm, &batch).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], (batch[0].id, "使用哈希表，O(n)".to_string()));
        assert_eq!(results[1], (batch[1].id, MODEL_ANSWER_FAILED.to_string()));
        assert_eq!(results[2].1, "直接给出的纯文本答案");
        assert_eq!(llm.prompt_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_answer_is_a_failure() {
        let llm = ScriptedLlm::new().reply("{\"answer\": \"  \"}");
        let batch = vec![question(1, QuestionType::Coding)];
        let results = answer_batch(&llm, &batch).await;
        assert_eq!(results[0].1, MODEL_ANSWER_FAILED);
    }

    #[test]
    fn test_batches_are_bounded() {
        let questions: Vec<QuestionRow> = (1..=7).map(|i| question(i, QuestionType::Coding)).collect();
        let sizes: Vec<usize> = questions.chunks(BATCH_SIZE).map(<[QuestionRow]>::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }
}
