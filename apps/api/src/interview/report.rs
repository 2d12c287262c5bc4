//! Interview reports: deterministic score aggregation plus an LLM narrative.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::analysis::profile::field_list;
use crate::analysis::repair::parse_llm_json;
use crate::errors::AppError;
use crate::interview::prompts::{build_report_prompt, ReportItem};
use crate::interview::repo::{self, ReportDraft};
use crate::llm_client::{CompletionRequest, LlmBackend};
use crate::models::interview::{InterviewRow, QuestionRow, QuestionType, ReportRow};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub overall: f64,
    pub technical: f64,
    pub communication: f64,
    pub system_design: f64,
    pub answered: usize,
    pub total: usize,
}

fn mean<'a>(questions: impl Iterator<Item = &'a QuestionRow>) -> Option<f64> {
    let scores: Vec<f64> = questions.filter_map(|q| q.score).collect();
    if scores.is_empty() {
        None
    } else {
        let m = scores.iter().sum::<f64>() / scores.len() as f64;
        Some((m * 10.0).round() / 10.0)
    }
}

/// overall: mean of scored questions; technical: coding, algorithm and
/// technical-knowledge (else overall); communication: behavioral and scenario
/// (else overall); system design: system-design (else technical).
pub fn aggregate(questions: &[QuestionRow]) -> ScoreSummary {
    let overall = mean(questions.iter()).unwrap_or(0.0);
    let technical = mean(questions.iter().filter(|q| q.kind().is_technical())).unwrap_or(overall);
    let communication = mean(questions.iter().filter(|q| q.kind().is_communication())).unwrap_or(overall);
    let system_design =
        mean(questions.iter().filter(|q| q.kind() == QuestionType::SystemDesign)).unwrap_or(technical);

    ScoreSummary {
        overall,
        technical,
        communication,
        system_design,
        answered: questions.iter().filter(|q| q.is_evaluated()).count(),
        total: questions.len(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub detailed_analysis: Value,
}

pub fn parse_narrative(value: &Value) -> Option<Narrative> {
    let narrative = Narrative {
        strengths: field_list(value, "strengths"),
        weaknesses: field_list(value, "weaknesses"),
        recommendations: field_list(value, "recommendations"),
        detailed_analysis: match value.get("detailedAnalysis") {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(Value::String(s)) if !s.trim().is_empty() => json!({ "summary": s.trim() }),
            _ => json!({}),
        },
    };
    if narrative.strengths.is_empty() && narrative.weaknesses.is_empty() && narrative.recommendations.is_empty() {
        None
    } else {
        Some(narrative)
    }
}

fn dimension_label(name: &str, score: f64) -> String {
    format!("{name}（{score:.0}分）")
}

/// Narrative derived from the scores alone, used when the LLM is unavailable.
pub fn fallback_narrative(summary: &ScoreSummary, questions: &[QuestionRow]) -> Narrative {
    let dimensions = [
        ("技术能力", summary.technical),
        ("沟通表达", summary.communication),
        ("系统设计", summary.system_design),
    ];
    let mut strengths: Vec<String> = dimensions
        .iter()
        .filter(|(_, s)| *s >= 75.0)
        .map(|(n, s)| format!("{}表现良好", dimension_label(n, *s)))
        .collect();
    let mut weaknesses: Vec<String> = dimensions
        .iter()
        .filter(|(_, s)| *s < 60.0)
        .map(|(n, s)| format!("{}有待提升", dimension_label(n, *s)))
        .collect();

    let weakest = questions
        .iter()
        .filter(|q| q.score.is_some_and(|s| s < 60.0))
        .map(|q| q.category.clone())
        .filter(|c| !c.is_empty());
    let mut recommendations: Vec<String> = weakest
        .map(|c| format!("针对「{c}」方向进行专项复习"))
        .collect();
    recommendations.dedup();

    if summary.answered < summary.total {
        weaknesses.push(format!(
            "有 {} 道题目未完成作答",
            summary.total - summary.answered
        ));
    }
    if strengths.is_empty() {
        strengths.push("完成了模拟面试，具备继续提升的基础".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("对照参考答案复盘每道题目，总结知识盲区".to_string());
    }

    Narrative {
        strengths,
        weaknesses,
        recommendations,
        detailed_analysis: json!({
            "summary": format!(
                "本次面试共 {} 题，完成 {} 题，综合得分 {:.0}。",
                summary.total, summary.answered, summary.overall
            ),
            "source": "fallback",
        }),
    }
}

fn scores_text(summary: &ScoreSummary) -> String {
    format!(
        "综合 {:.0}，技术 {:.0}，沟通 {:.0}，系统设计 {:.0}（完成 {}/{} 题）",
        summary.overall,
        summary.technical,
        summary.communication,
        summary.system_design,
        summary.answered,
        summary.total
    )
}

/// Scores are always computed locally; only the narrative depends on the LLM.
pub async fn build_report(llm: &dyn LlmBackend, position: &str, questions: &[QuestionRow]) -> ReportDraft {
    let summary = aggregate(questions);
    let items: Vec<ReportItem<'_>> = questions.iter().map(|question| ReportItem { question }).collect();
    let prompt = build_report_prompt(position, &scores_text(&summary), &items);

    let narrative = match llm.complete(CompletionRequest::standard(prompt, 0.5, 2500)).await {
        Ok(reply) => parse_llm_json(&reply).as_ref().and_then(parse_narrative),
        Err(e) => {
            warn!("Report narrative unavailable: {e}");
            None
        }
    }
    .unwrap_or_else(|| fallback_narrative(&summary, questions));

    let mut detailed_analysis = narrative.detailed_analysis;
    if let Value::Object(map) = &mut detailed_analysis {
        map.insert("scores".to_string(), json!(summary));
    }

    ReportDraft {
        overall_score: summary.overall,
        technical_score: summary.technical,
        communication_score: summary.communication,
        system_design_score: summary.system_design,
        strengths: narrative.strengths,
        weaknesses: narrative.weaknesses,
        recommendations: narrative.recommendations,
        detailed_analysis,
    }
}

/// The job title an interview was held for, from its job preference.
pub async fn position_for(state: &AppState, interview: &InterviewRow) -> Result<String, AppError> {
    let preference = match interview.job_position_id {
        Some(id) => state.preferences.find(interview.user_id, id).await?,
        None => None,
    };
    Ok(preference
        .map(|p| p.position)
        .unwrap_or_else(|| "软件工程师".to_string()))
}

/// How a report request is served for an interview in its current state.
#[derive(Debug)]
pub enum ReportPlan {
    /// The final report already exists.
    Stored(ReportRow),
    /// The interview is completed but has no report yet.
    Persist,
    /// The interview is still running: build in memory, never store.
    Preview,
}

pub fn plan(interview: &InterviewRow, existing: Option<ReportRow>) -> ReportPlan {
    match existing {
        Some(report) if interview.is_completed() => ReportPlan::Stored(report),
        _ if interview.is_completed() => ReportPlan::Persist,
        _ => ReportPlan::Preview,
    }
}

async fn draft_for(state: &AppState, interview: &InterviewRow) -> anyhow::Result<ReportDraft> {
    let position = position_for(state, interview).await?;
    let questions = repo::questions_for_interview(&state.db, interview.id).await?;
    Ok(build_report(state.llm.as_ref(), &position, &questions).await)
}

/// The interview's report. Only a completed interview gets a stored report;
/// a running one gets a fresh preview on every call.
pub async fn current_report(state: &AppState, interview: &InterviewRow) -> anyhow::Result<ReportRow> {
    let existing = repo::find_report(&state.db, interview.id).await?;
    match plan(interview, existing) {
        ReportPlan::Stored(report) => Ok(report),
        ReportPlan::Persist => {
            let draft = draft_for(state, interview).await?;
            let report = repo::insert_report(&state.db, interview.id, &draft).await?;
            info!(
                "Stored report for interview {} (overall {:.1})",
                interview.id, report.overall_score
            );
            Ok(report)
        }
        ReportPlan::Preview => Ok(draft_for(state, interview).await?.preview(interview.id)),
    }
}

/// Stores the final report of a completed interview.
pub async fn generate_and_store(state: &AppState, interview: &InterviewRow) -> anyhow::Result<ReportRow> {
    if !interview.is_completed() {
        anyhow::bail!("interview {} is not completed", interview.id);
    }
    current_report(state, interview).await
}
