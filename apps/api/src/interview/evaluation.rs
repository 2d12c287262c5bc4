use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::profile::{field_list, number, str_field};
use crate::analysis::repair::parse_llm_json;
use crate::errors::AppError;
use crate::interview::completion::{self, RoundProgress};
use crate::interview::prompts::{build_comparison_prompt, build_evaluation_prompt, build_follow_up_prompt};
use crate::interview::repo;
use crate::llm_client::{CompletionRequest, LlmBackend};
use crate::models::interview::{InterviewRow, ModelAnswer, QuestionRow};
use crate::state::AppState;
use crate::tasks::{self, Task};

/// A resubmitted answer scoring at least this is compared with the model answer.
pub const COMPARISON_MIN_SCORE: f64 = 80.0;
/// The comparison must be more confident than this to replace the model answer.
pub const REPLACEMENT_MIN_CONFIDENCE: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub score: f64,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub suggestions: Vec<String>,
}

/// `score` is required; it is clamped to 0..=100.
pub fn parse_evaluation(value: &Value) -> Option<Evaluation> {
    let score = value.get("score").and_then(number)?.clamp(0.0, 100.0);
    Some(Evaluation {
        score: score.round(),
        feedback: str_field(value, "feedback"),
        strengths: field_list(value, "strengths"),
        improvements: field_list(value, "improvements"),
        suggestions: field_list(value, "suggestions"),
    })
}

/// Live evaluation has no deterministic fallback: any failure is `UpstreamUnavailable`.
pub async fn evaluate_answer(
    llm: &dyn LlmBackend,
    question: &QuestionRow,
    answer: &str,
) -> Result<Evaluation, AppError> {
    let prompt = build_evaluation_prompt(question, answer);
    let reply = llm
        .complete(CompletionRequest::standard(prompt, 0.3, 1500))
        .await?;
    parse_llm_json(&reply)
        .as_ref()
        .and_then(parse_evaluation)
        .ok_or_else(|| AppError::UpstreamUnavailable("evaluation reply could not be parsed".to_string()))
}

/// Best effort: `None` on any failure.
pub async fn follow_up(llm: &dyn LlmBackend, question: &QuestionRow, answer: &str, score: f64) -> Option<String> {
    let prompt = build_follow_up_prompt(question, answer, score);
    match llm.complete(CompletionRequest::standard(prompt, 0.7, 500)).await {
        Ok(reply) => parse_llm_json(&reply)
            .map(|v| str_field(&v, "followUp"))
            .filter(|f| !f.is_empty()),
        Err(e) => {
            warn!("Follow-up generation failed for question {}: {e}", question.id);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub is_better: bool,
    pub confidence: f64,
    pub reason: String,
}

impl Comparison {
    pub fn warrants_replacement(&self) -> bool {
        self.is_better && self.confidence > REPLACEMENT_MIN_CONFIDENCE
    }
}

pub fn parse_comparison(value: &Value) -> Option<Comparison> {
    let is_better = match value.get("isBetter")? {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => return None,
    };
    let confidence = value.get("confidence").and_then(number).unwrap_or(0.0);
    Some(Comparison {
        is_better,
        confidence: if confidence > 0.0 && confidence < 1.0 {
            confidence * 100.0
        } else {
            confidence
        },
        reason: str_field(value, "reason"),
    })
}

/// For a resubmitted, high-scoring answer, asks the LLM whether it beats the
/// current model answer. Returns the answer to store when it does.
pub async fn improved_model_answer(
    llm: &dyn LlmBackend,
    previous: &QuestionRow,
    new_answer: &str,
    score: f64,
) -> Option<String> {
    if previous.user_answer.is_none() || score < COMPARISON_MIN_SCORE {
        return None;
    }
    let ModelAnswer::Ready(current) = previous.model_answer_state() else {
        return None;
    };

    let prompt = build_comparison_prompt(previous, &current, new_answer);
    let reply = match llm.complete(CompletionRequest::standard(prompt, 0.2, 500)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Answer comparison failed for question {}: {e}", previous.id);
            return None;
        }
    };
    let comparison = parse_llm_json(&reply).as_ref().and_then(parse_comparison)?;
    info!(
        "Answer comparison for question {}: better={}, confidence={:.0} ({})",
        previous.id, comparison.is_better, comparison.confidence, comparison.reason
    );
    comparison
        .warrants_replacement()
        .then(|| new_answer.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub evaluation: Evaluation,
    pub follow_up: Option<String>,
    pub model_answer_replaced: bool,
    #[serde(flatten)]
    pub progress: RoundProgress,
}

/// A completed interview has a final report, so its answers are frozen.
pub fn ensure_accepts_answers(interview: &InterviewRow) -> Result<(), AppError> {
    if interview.is_completed() {
        return Err(AppError::Conflict("面试已结束，无法继续作答".to_string()));
    }
    Ok(())
}

/// Evaluates and stores one answer, then rechecks round completion.
pub async fn submit_answer(
    state: &AppState,
    user_id: Uuid,
    question_id: Uuid,
    answer: &str,
) -> Result<Submission, AppError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(AppError::MissingField("answer".to_string()));
    }
    let (question, interview) = repo::find_question_for_user(&state.db, user_id, question_id)
        .await?
        .ok_or_else(|| AppError::NotFound("题目不存在".to_string()))?;
    ensure_accepts_answers(&interview)?;
    let interview_id = interview.id;

    let llm = state.llm.as_ref();
    let evaluation = evaluate_answer(llm, &question, answer).await?;
    let follow_up = follow_up(llm, &question, answer, evaluation.score).await;

    repo::record_evaluation(
        &state.db,
        question.id,
        answer,
        evaluation.score,
        &evaluation.feedback,
        follow_up.as_deref(),
    )
    .await?;

    let replacement = improved_model_answer(llm, &question, answer, evaluation.score).await;
    if let Some(better) = &replacement {
        repo::set_model_answer(&state.db, question.id, better).await?;
        info!("Replaced model answer of question {} with the candidate's answer", question.id);
    }

    let progress = completion::after_evaluation(&state.db, question.round_id, interview_id).await?;
    if progress.report_due {
        if let Err(e) = tasks::enqueue(&state.db, Task::InterviewReport { interview_id }).await {
            warn!("Could not queue report for interview {interview_id}: {e}");
        }
    }

    Ok(Submission {
        evaluation,
        follow_up,
        model_answer_replaced: replacement.is_some(),
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedLlm;
    use crate::models::interview::{interview, question, InterviewStatus, QuestionType};
    use serde_json::json;

    #[test]
    fn test_parse_evaluation_clamps_score() {
        let eval = parse_evaluation(&json!({"score": 130, "feedback": " 很好 ", "strengths": ["清晰"]})).unwrap();
        assert_eq!(eval.score, 100.0);
        assert_eq!(eval.feedback, "很好");
        assert_eq!(eval.strengths, vec!["清晰"]);
        assert!(eval.improvements.is_empty());

        let eval = parse_evaluation(&json!({"score": "-5"})).unwrap();
        assert_eq!(eval.score, 0.0);
        assert!(parse_evaluation(&json!({"feedback": "无分数"})).is_none());
    }

    #[tokio::test]
    async fn test_evaluate_answer_reads_repaired_reply() {
        let llm = ScriptedLlm::new().reply("评估如下：{\"score\": 82, \"feedback\": \"不错\", \"strengths\": [\"思路清晰\"],");
        let q = question(1, QuestionType::Algorithm);
        let eval = evaluate_answer(&llm, &q, "双指针").await.unwrap();
        assert_eq!(eval.score, 82.0);
        assert_eq!(eval.feedback, "不错");
    }

    #[tokio::test]
    async fn test_evaluate_answer_without_llm_is_upstream_error() {
        let llm = ScriptedLlm::new().fail(500);
        let q = question(1, QuestionType::Coding);
        let err = evaluate_answer(&llm, &q, "答案").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_follow_up_is_none_on_failure() {
        let q = question(1, QuestionType::Coding);
        assert_eq!(follow_up(&ScriptedLlm::new(), &q, "答案", 60.0).await, None);
        let llm = ScriptedLlm::new().reply("{\"followUp\": \"如果数据量翻倍呢？\"}");
        assert_eq!(
            follow_up(&llm, &q, "答案", 60.0).await.as_deref(),
            Some("如果数据量翻倍呢？")
        );
    }

    #[test]
    fn test_replacement_needs_better_and_confident() {
        let c = parse_comparison(&json!({"isBetter": true, "confidence": 71})).unwrap();
        assert!(c.warrants_replacement());
        let c = parse_comparison(&json!({"isBetter": true, "confidence": 70})).unwrap();
        assert!(!c.warrants_replacement());
        let c = parse_comparison(&json!({"isBetter": false, "confidence": 95})).unwrap();
        assert!(!c.warrants_replacement());
        let c = parse_comparison(&json!({"isBetter": "true", "confidence": 0.9})).unwrap();
        assert!(c.warrants_replacement());
        // A 0-100 confidence of exactly 1 is not a fraction.
        let c = parse_comparison(&json!({"isBetter": true, "confidence": 1})).unwrap();
        assert_eq!(c.confidence, 1.0);
        assert!(!c.warrants_replacement());
    }

    #[tokio::test]
    async fn test_comparison_only_for_high_scoring_resubmission() {
        let mut q = question(1, QuestionType::TechnicalKnowledge);
        q.model_answer = Some("旧的参考答案".to_string());

        // First submission: nothing to compare against yet.
        let llm = ScriptedLlm::new();
        assert_eq!(improved_model_answer(&llm, &q, "新答案", 95.0).await, None);
        assert_eq!(llm.prompt_count(), 0);

        q.user_answer = Some("第一次回答".to_string());
        assert_eq!(improved_model_answer(&llm, &q, "新答案", 79.0).await, None);
        assert_eq!(llm.prompt_count(), 0);

        let llm = ScriptedLlm::new().reply("{\"isBetter\": true, \"confidence\": 88, \"reason\": \"更完整\"}");
        assert_eq!(
            improved_model_answer(&llm, &q, "新答案", 90.0).await.as_deref(),
            Some("新答案")
        );
    }

    #[tokio::test]
    async fn test_failed_model_answer_is_never_compared() {
        let mut q = question(1, QuestionType::TechnicalKnowledge);
        q.user_answer = Some("第一次回答".to_string());
        q.model_answer = Some(crate::models::interview::MODEL_ANSWER_FAILED.to_string());
        let llm = ScriptedLlm::new();
        assert_eq!(improved_model_answer(&llm, &q, "新答案", 95.0).await, None);
        assert_eq!(llm.prompt_count(), 0);
    }

    #[test]
    fn test_completed_interview_rejects_answers() {
        assert!(ensure_accepts_answers(&interview(InterviewStatus::InProgress)).is_ok());
        let err = ensure_accepts_answers(&interview(InterviewStatus::Completed)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
