//! Interview, round, question and report persistence.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::interview::{
    Difficulty, InterviewRow, InterviewStatus, InterviewType, QuestionRow, QuestionSource,
    QuestionType, ReportRow, RoundRow,
};

/// A question about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub content: String,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub category: String,
    pub source: QuestionSource,
}

#[derive(Debug)]
pub struct CreatedInterview {
    pub interview: InterviewRow,
    pub round: RoundRow,
    pub questions: Vec<QuestionRow>,
}

/// A report about to be stored.
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub overall_score: f64,
    pub technical_score: f64,
    pub communication_score: f64,
    pub system_design_score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub detailed_analysis: serde_json::Value,
}

impl ReportDraft {
    /// An unsaved report row, for showing a report before the interview completes.
    pub fn preview(self, interview_id: Uuid) -> ReportRow {
        ReportRow {
            id: Uuid::nil(),
            interview_id,
            overall_score: self.overall_score,
            technical_score: self.technical_score,
            communication_score: self.communication_score,
            system_design_score: self.system_design_score,
            strengths: self.strengths,
            weaknesses: self.weaknesses,
            recommendations: self.recommendations,
            detailed_analysis: self.detailed_analysis,
            created_at: Utc::now(),
        }
    }
}

/// Interview (in-progress), round 1 and its questions in one transaction.
pub async fn create_interview(
    pool: &PgPool,
    user_id: Uuid,
    job_position_id: Option<Uuid>,
    interview_type: InterviewType,
    questions: &[NewQuestion],
) -> Result<CreatedInterview, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let interview = sqlx::query_as::<_, InterviewRow>(
        r#"
        INSERT INTO interviews (id, user_id, job_position_id, type, status, started_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(job_position_id)
    .bind(interview_type.as_str())
    .bind(InterviewStatus::InProgress.as_str())
    .fetch_one(&mut *tx)
    .await?;

    let round = sqlx::query_as::<_, RoundRow>(
        r#"
        INSERT INTO interview_rounds (id, interview_id, round_number, type)
        VALUES ($1, $2, 1, $3)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(interview.id)
    .bind(interview_type.first_round().as_str())
    .fetch_one(&mut *tx)
    .await?;

    let mut created = Vec::with_capacity(questions.len());
    for (i, q) in questions.iter().enumerate() {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            INSERT INTO questions (id, round_id, position, content, type, difficulty, category, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(round.id)
        .bind(i as i32 + 1)
        .bind(&q.content)
        .bind(q.question_type.as_str())
        .bind(q.difficulty.as_str())
        .bind(&q.category)
        .bind(q.source.as_str())
        .fetch_one(&mut *tx)
        .await?;
        created.push(row);
    }

    tx.commit().await?;
    Ok(CreatedInterview {
        interview,
        round,
        questions: created,
    })
}

/// Owner-checked lookup.
pub async fn find_interview(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<InterviewRow>, sqlx::Error> {
    sqlx::query_as::<_, InterviewRow>("SELECT * FROM interviews WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_interview_by_id(pool: &PgPool, id: Uuid) -> Result<Option<InterviewRow>, sqlx::Error> {
    sqlx::query_as::<_, InterviewRow>("SELECT * FROM interviews WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn rounds_for_interview(pool: &PgPool, interview_id: Uuid) -> Result<Vec<RoundRow>, sqlx::Error> {
    sqlx::query_as::<_, RoundRow>(
        "SELECT * FROM interview_rounds WHERE interview_id = $1 ORDER BY round_number",
    )
    .bind(interview_id)
    .fetch_all(pool)
    .await
}

pub async fn questions_for_round(pool: &PgPool, round_id: Uuid) -> Result<Vec<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>("SELECT * FROM questions WHERE round_id = $1 ORDER BY position")
        .bind(round_id)
        .fetch_all(pool)
        .await
}

/// Every question of every round, in round then position order.
pub async fn questions_for_interview(pool: &PgPool, interview_id: Uuid) -> Result<Vec<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT q.* FROM questions q
        JOIN interview_rounds r ON r.id = q.round_id
        WHERE r.interview_id = $1
        ORDER BY r.round_number, q.position
        "#,
    )
    .bind(interview_id)
    .fetch_all(pool)
    .await
}

/// A question together with the interview it belongs to, checked against the owner.
pub async fn find_question_for_user(
    pool: &PgPool,
    user_id: Uuid,
    question_id: Uuid,
) -> Result<Option<(QuestionRow, InterviewRow)>, sqlx::Error> {
    let question = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT q.* FROM questions q
        JOIN interview_rounds r ON r.id = q.round_id
        JOIN interviews i ON i.id = r.interview_id
        WHERE q.id = $1 AND i.user_id = $2
        "#,
    )
    .bind(question_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(question) = question else {
        return Ok(None);
    };
    let interview = sqlx::query_as::<_, InterviewRow>(
        r#"
        SELECT i.* FROM interviews i
        JOIN interview_rounds r ON r.interview_id = i.id
        WHERE r.id = $1
        "#,
    )
    .bind(question.round_id)
    .fetch_one(pool)
    .await?;
    Ok(Some((question, interview)))
}

/// Stores an answer with its score. A follow-up, when present, is appended.
pub async fn record_evaluation(
    pool: &PgPool,
    question_id: Uuid,
    answer: &str,
    score: f64,
    feedback: &str,
    follow_up: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE questions
        SET user_answer = $2,
            score = $3,
            feedback = $4,
            follow_ups = CASE WHEN $5::TEXT IS NULL THEN follow_ups ELSE array_append(follow_ups, $5::TEXT) END
        WHERE id = $1
        "#,
    )
    .bind(question_id)
    .bind(answer)
    .bind(score)
    .bind(feedback)
    .bind(follow_up)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_model_answer(pool: &PgPool, question_id: Uuid, answer: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE questions SET model_answer = $2 WHERE id = $1")
        .bind(question_id)
        .bind(answer)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn questions_missing_model_answer(
    pool: &PgPool,
    interview_id: Uuid,
) -> Result<Vec<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT q.* FROM questions q
        JOIN interview_rounds r ON r.id = q.round_id
        WHERE r.interview_id = $1 AND q.model_answer IS NULL
        ORDER BY r.round_number, q.position
        "#,
    )
    .bind(interview_id)
    .fetch_all(pool)
    .await
}

pub async fn set_round_result(pool: &PgPool, round_id: Uuid, score: f64, feedback: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE interview_rounds SET score = $2, feedback = $3 WHERE id = $1")
        .bind(round_id)
        .bind(score)
        .bind(feedback)
        .execute(pool)
        .await?;
    Ok(())
}

/// Marks the interview completed. Returns `true` only for the caller that
/// performed the transition; concurrent callers observe `false`.
pub async fn complete_interview(pool: &PgPool, interview_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE interviews
        SET status = $2, completed_at = NOW()
        WHERE id = $1 AND status <> $2
        "#,
    )
    .bind(interview_id)
    .bind(InterviewStatus::Completed.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_report(pool: &PgPool, interview_id: Uuid) -> Result<Option<ReportRow>, sqlx::Error> {
    sqlx::query_as::<_, ReportRow>("SELECT * FROM interview_reports WHERE interview_id = $1")
        .bind(interview_id)
        .fetch_optional(pool)
        .await
}

/// At most one report per interview: a second insert is a no-op and the
/// stored report is returned instead.
pub async fn insert_report(pool: &PgPool, interview_id: Uuid, draft: &ReportDraft) -> Result<ReportRow, sqlx::Error> {
    let inserted = sqlx::query_as::<_, ReportRow>(
        r#"
        INSERT INTO interview_reports
            (id, interview_id, overall_score, technical_score, communication_score,
             system_design_score, strengths, weaknesses, recommendations, detailed_analysis)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (interview_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(interview_id)
    .bind(draft.overall_score)
    .bind(draft.technical_score)
    .bind(draft.communication_score)
    .bind(draft.system_design_score)
    .bind(&draft.strengths)
    .bind(&draft.weaknesses)
    .bind(&draft.recommendations)
    .bind(Json(&draft.detailed_analysis))
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(row) => Ok(row),
        None => find_report(pool, interview_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound),
    }
}

/// Completed interviews of a user that have a report, newest first.
pub async fn reports_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<(InterviewRow, ReportRow)>, sqlx::Error> {
    let reports = sqlx::query_as::<_, ReportRow>(
        r#"
        SELECT rep.* FROM interview_reports rep
        JOIN interviews i ON i.id = rep.interview_id
        WHERE i.user_id = $1
        ORDER BY rep.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let interviews = sqlx::query_as::<_, InterviewRow>("SELECT * FROM interviews WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(reports
        .into_iter()
        .filter_map(|report| {
            interviews
                .iter()
                .find(|i| i.id == report.interview_id)
                .cloned()
                .map(|interview| (interview, report))
        })
        .collect())
}
