//! Round and interview completion, recomputed from storage after every answer.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::interview::repo;
use crate::models::interview::QuestionRow;

/// A round is complete when it has questions and every one is answered and scored.
pub fn is_round_complete(questions: &[QuestionRow]) -> bool {
    !questions.is_empty() && questions.iter().all(QuestionRow::is_evaluated)
}

/// Mean of the scored questions, one decimal.
pub fn round_score(questions: &[QuestionRow]) -> Option<f64> {
    let scores: Vec<f64> = questions.iter().filter_map(|q| q.score).collect();
    if scores.is_empty() {
        return None;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

pub fn round_feedback(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "表现优秀，回答全面且有深度",
        s if s >= 75.0 => "表现良好，个别知识点可进一步深入",
        s if s >= 60.0 => "基本合格，建议针对薄弱环节加强练习",
        _ => "仍需努力，建议系统复习相关知识",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundProgress {
    pub round_completed: bool,
    pub round_score: Option<f64>,
    pub interview_completed: bool,
    /// Set only for the caller whose update moved the interview to `completed`.
    #[serde(skip)]
    pub report_due: bool,
}

/// Re-reads the round's questions. On completion stores the round result and,
/// once every round is scored, completes the interview.
pub async fn after_evaluation(pool: &PgPool, round_id: Uuid, interview_id: Uuid) -> Result<RoundProgress, sqlx::Error> {
    let questions = repo::questions_for_round(pool, round_id).await?;
    if !is_round_complete(&questions) {
        return Ok(RoundProgress::default());
    }

    let score = round_score(&questions).unwrap_or_default();
    repo::set_round_result(pool, round_id, score, round_feedback(score)).await?;
    info!("Round {round_id} of interview {interview_id} completed with {score}");

    let rounds = repo::rounds_for_interview(pool, interview_id).await?;
    let all_scored = rounds.iter().all(|r| r.score.is_some());
    let report_due = all_scored && repo::complete_interview(pool, interview_id).await?;
    if report_due {
        info!("Interview {interview_id} completed");
    }

    Ok(RoundProgress {
        round_completed: true,
        round_score: Some(score),
        interview_completed: all_scored,
        report_due,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interview::{question, QuestionType};

    #[test]
    fn test_empty_round_is_not_complete() {
        assert!(!is_round_complete(&[]));
        assert_eq!(round_score(&[]), None);
    }

    #[test]
    fn test_completion_flips_exactly_on_last_submission() {
        let n = 4;
        let mut questions: Vec<QuestionRow> = (1..=n).map(|i| question(i, QuestionType::Coding)).collect();
        let mut flips = Vec::new();
        let mut was_complete = is_round_complete(&questions);

        for i in 0..questions.len() {
            questions[i].user_answer = Some(format!("回答 {i}"));
            questions[i].score = Some(70.0 + i as f64);
            let now = is_round_complete(&questions);
            if now != was_complete {
                flips.push(i + 1);
            }
            was_complete = now;
        }
        assert_eq!(flips, vec![n as usize]);
    }

    #[test]
    fn test_answer_without_score_does_not_complete() {
        let mut q = question(1, QuestionType::Behavioral);
        q.user_answer = Some("回答".into());
        assert!(!is_round_complete(std::slice::from_ref(&q)));
        q.score = Some(0.0);
        assert!(is_round_complete(std::slice::from_ref(&q)));
    }

    #[test]
    fn test_round_score_is_mean_of_scored() {
        let mut a = question(1, QuestionType::Coding);
        let mut b = question(2, QuestionType::Coding);
        a.score = Some(80.0);
        b.score = Some(65.0);
        assert_eq!(round_score(&[a, b, question(3, QuestionType::Coding)]), Some(72.5));
        assert_eq!(round_feedback(72.5), "基本合格，建议针对薄弱环节加强练习");
    }

    #[test]
    fn test_progress_hides_report_flag() {
        let json = serde_json::to_value(RoundProgress {
            round_completed: true,
            round_score: Some(88.0),
            interview_completed: true,
            report_due: true,
        })
        .unwrap();
        assert_eq!(json["roundCompleted"], true);
        assert!(json.get("reportDue").is_none());
    }
}
