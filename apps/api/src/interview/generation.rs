//! Interview creation from the stored question bank or from a fresh LLM call.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::profile::{str_field, AiProfile, SimulatedInterview};
use crate::analysis::repair::parse_llm_json;
use crate::errors::AppError;
use crate::interview::prompts::{build_question_generation_prompt, QuestionContext};
use crate::interview::repo::{self, CreatedInterview, NewQuestion};
use crate::llm_client::{CompletionRequest, LlmBackend};
use crate::models::interview::{Difficulty, InterviewType, QuestionSource, QuestionType};
use crate::models::preference::JobPreferenceRow;
use crate::resume::repo as resume_repo;
use crate::state::AppState;
use crate::tasks::{self, Task};

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const MAX_QUESTION_COUNT: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub resume_id: Option<Uuid>,
    pub job_preference_id: Option<Uuid>,
    pub interview_type: Option<InterviewType>,
    pub question_count: Option<usize>,
}

impl GenerateRequest {
    pub fn count(&self) -> usize {
        self.question_count
            .unwrap_or(DEFAULT_QUESTION_COUNT)
            .clamp(1, MAX_QUESTION_COUNT)
    }

    pub fn interview_type(&self) -> InterviewType {
        self.interview_type.unwrap_or_default()
    }
}

/// A freshly created interview plus how its questions were obtained.
#[derive(Debug)]
pub struct Generated {
    pub created: CreatedInterview,
    pub source: QuestionSource,
}

/// Bank categories visited first for each interview type; the rest follow in this order.
fn category_order(interview_type: InterviewType) -> [&'static str; 6] {
    match interview_type {
        InterviewType::Technical => [
            "techDepth",
            "projectExperience",
            "algorithms",
            "architecture",
            "systemDesign",
            "behavioral",
        ],
        InterviewType::Behavioral => [
            "behavioral",
            "projectExperience",
            "techDepth",
            "architecture",
            "systemDesign",
            "algorithms",
        ],
        InterviewType::SystemDesign => [
            "systemDesign",
            "architecture",
            "projectExperience",
            "techDepth",
            "algorithms",
            "behavioral",
        ],
    }
}

fn bank_question_kind(category: &str) -> (QuestionType, Difficulty) {
    match category {
        "architecture" | "systemDesign" => (QuestionType::SystemDesign, Difficulty::Hard),
        "algorithms" => (QuestionType::Algorithm, Difficulty::Medium),
        "projectExperience" => (QuestionType::Scenario, Difficulty::Medium),
        "behavioral" => (QuestionType::Behavioral, Difficulty::Easy),
        _ => (QuestionType::TechnicalKnowledge, Difficulty::Medium),
    }
}

fn bank_category_label(category: &str, technology: Option<&str>) -> String {
    let label = match category {
        "architecture" => "架构设计",
        "techDepth" => "技术深度",
        "algorithms" => "算法",
        "projectExperience" => "项目经验",
        "systemDesign" => "系统设计",
        "behavioral" => "行为面试",
        other => other,
    };
    match technology {
        Some(tech) => format!("{label}·{tech}"),
        None => label.to_string(),
    }
}

/// Picks up to `count` questions by taking one from each category in turn,
/// so a short interview still covers several topics. Duplicates are skipped.
pub fn select_bank_questions(
    bank: &SimulatedInterview,
    interview_type: InterviewType,
    count: usize,
) -> Vec<NewQuestion> {
    let preferred = category_order(interview_type);
    let mut categories: Vec<&str> = preferred
        .iter()
        .copied()
        .filter(|c| bank.categories.contains_key(*c))
        .collect();
    categories.extend(
        bank.categories
            .keys()
            .map(String::as_str)
            .filter(|k| !preferred.iter().any(|p| p == k)),
    );

    let mut queues: Vec<std::vec::IntoIter<_>> = categories
        .iter()
        .map(|c| bank.questions_in(c).into_iter())
        .collect();

    let mut selected: Vec<NewQuestion> = Vec::with_capacity(count);
    while selected.len() < count {
        let mut took_any = false;
        for queue in queues.iter_mut() {
            if selected.len() == count {
                break;
            }
            let Some(q) = queue.next() else { continue };
            took_any = true;
            if selected.iter().any(|s| s.content == q.content) {
                continue;
            }
            let (question_type, difficulty) = bank_question_kind(&q.category);
            selected.push(NewQuestion {
                category: bank_category_label(&q.category, q.technology.as_deref()),
                content: q.content,
                question_type,
                difficulty,
                source: QuestionSource::Bank,
            });
        }
        if !took_any {
            break;
        }
    }
    selected
}

/// Reads `{"questions": [...]}`. Items without text are dropped; `None` when
/// nothing usable remains.
pub fn parse_generated_questions(value: &Value, count: usize) -> Option<Vec<NewQuestion>> {
    let items = value.get("questions")?.as_array()?;
    let questions: Vec<NewQuestion> = items
        .iter()
        .filter_map(|item| {
            let content = match item {
                Value::String(s) => s.trim().to_string(),
                _ => {
                    let c = str_field(item, "content");
                    if c.is_empty() {
                        str_field(item, "question")
                    } else {
                        c
                    }
                }
            };
            if content.is_empty() {
                return None;
            }
            Some(NewQuestion {
                content,
                question_type: QuestionType::parse(&str_field(item, "type")),
                difficulty: Difficulty::parse(&str_field(item, "difficulty")),
                category: str_field(item, "category"),
                source: QuestionSource::Generated,
            })
        })
        .take(count)
        .collect();

    if questions.is_empty() {
        None
    } else {
        Some(questions)
    }
}

pub fn question_context(
    preference: Option<&JobPreferenceRow>,
    profile: Option<&AiProfile>,
    interview_type: InterviewType,
    count: usize,
) -> QuestionContext {
    let mut ctx = QuestionContext {
        position: "软件工程师".to_string(),
        interview_type,
        count,
        ..Default::default()
    };
    if let Some(pref) = preference {
        ctx.position = pref.position.clone();
        ctx.level = pref.level.clone();
        ctx.company = pref.display_company().to_string();
        let requirements: Vec<&str> = [
            pref.requirements.as_deref(),
            pref.job_responsibilities.as_deref(),
            pref.job_requirements.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|r| !r.trim().is_empty())
        .collect();
        if !requirements.is_empty() {
            ctx.requirements = Some(requirements.join("\n"));
        }
    }
    if let Some(profile) = profile {
        ctx.experience_level = Some(profile.experience_level.as_str().to_string());
        if ctx.level.is_empty() {
            ctx.level = profile.experience_level.as_str().to_string();
        }
        let mut stack: Vec<_> = profile.tech_stack.iter().collect();
        stack.sort_by(|a, b| b.value_score.cmp(&a.value_score));
        ctx.tech_stack = stack.iter().take(8).map(|t| t.technology.clone()).collect();
        ctx.specializations = profile.specializations.clone();
    }
    if ctx.level.is_empty() {
        ctx.level = "mid".to_string();
    }
    ctx
}

/// Asks the LLM for questions; on failure the bank is used when there is one.
/// Without a bank an LLM failure is `UpstreamUnavailable`.
pub async fn realtime_questions(
    llm: &dyn LlmBackend,
    ctx: &QuestionContext,
    bank: Option<&SimulatedInterview>,
) -> Result<(Vec<NewQuestion>, QuestionSource), AppError> {
    let prompt = build_question_generation_prompt(ctx);
    let reason = match llm.complete(CompletionRequest::standard(prompt, 0.8, 3000)).await {
        Ok(reply) => match parse_llm_json(&reply).and_then(|v| parse_generated_questions(&v, ctx.count)) {
            Some(questions) => return Ok((questions, QuestionSource::Generated)),
            None => "reply held no usable questions".to_string(),
        },
        Err(e) => e.to_string(),
    };

    match bank.map(|b| select_bank_questions(b, ctx.interview_type, ctx.count)) {
        Some(questions) if !questions.is_empty() => {
            warn!("Realtime generation failed ({reason}); using the question bank");
            Ok((questions, QuestionSource::Bank))
        }
        _ => Err(AppError::UpstreamUnavailable(reason)),
    }
}

async fn resolve_preference(
    state: &AppState,
    user_id: Uuid,
    id: Option<Uuid>,
) -> Result<Option<JobPreferenceRow>, AppError> {
    match id {
        Some(id) => state
            .preferences
            .find(user_id, id)
            .await?
            .map(Some)
            .ok_or_else(|| AppError::NotFound("岗位偏好不存在".to_string())),
        None => state.preferences.default_for(user_id).await,
    }
}

async fn resolve_profile(
    state: &AppState,
    user_id: Uuid,
    resume_id: Option<Uuid>,
) -> Result<Option<AiProfile>, AppError> {
    let resume = match resume_id {
        Some(id) => Some(
            resume_repo::find_resume(&state.db, user_id, id)
                .await?
                .ok_or_else(|| AppError::NotFound("简历不存在".to_string()))?,
        ),
        None => resume_repo::latest_resume_for_user(&state.db, user_id).await?,
    };
    let Some(resume) = resume else {
        return Ok(None);
    };
    Ok(resume_repo::load_ai_profile(&state.db, resume.id)
        .await?
        .map(|stored| stored.profile))
}

/// POST /api/interview/generate: questions come from the stored bank only.
pub async fn generate_from_bank(
    state: &AppState,
    user_id: Uuid,
    request: &GenerateRequest,
) -> Result<Generated, AppError> {
    let bank = resolve_profile(state, user_id, request.resume_id)
        .await?
        .and_then(|p| p.simulated_interview)
        .ok_or_else(|| AppError::invalid_with_code("NO_QUESTION_BANK", "请先上传简历并完成AI分析以生成题库"))?;

    let questions = select_bank_questions(&bank, request.interview_type(), request.count());
    if questions.is_empty() {
        return Err(AppError::invalid_with_code("NO_QUESTION_BANK", "题库中没有可用的题目"));
    }
    let preference = resolve_preference(state, user_id, request.job_preference_id).await?;
    let created = persist(state, user_id, preference.as_ref(), request.interview_type(), &questions).await?;
    Ok(Generated {
        created,
        source: QuestionSource::Bank,
    })
}

/// POST /api/interview/generate-realtime: fresh questions for the job preference.
pub async fn generate_realtime(
    state: &AppState,
    user_id: Uuid,
    request: &GenerateRequest,
) -> Result<Generated, AppError> {
    let preference = resolve_preference(state, user_id, request.job_preference_id).await?;
    let profile = resolve_profile(state, user_id, request.resume_id).await?;
    let ctx = question_context(
        preference.as_ref(),
        profile.as_ref(),
        request.interview_type(),
        request.count(),
    );

    let bank = profile.as_ref().and_then(|p| p.simulated_interview.as_ref());
    let (questions, source) = realtime_questions(state.llm.as_ref(), &ctx, bank).await?;
    let created = persist(state, user_id, preference.as_ref(), request.interview_type(), &questions).await?;
    Ok(Generated { created, source })
}

async fn persist(
    state: &AppState,
    user_id: Uuid,
    preference: Option<&JobPreferenceRow>,
    interview_type: InterviewType,
    questions: &[NewQuestion],
) -> Result<CreatedInterview, AppError> {
    let created = repo::create_interview(
        &state.db,
        user_id,
        preference.map(|p| p.id),
        interview_type,
        questions,
    )
    .await?;
    info!(
        "Created interview {} with {} questions for user {user_id}",
        created.interview.id,
        created.questions.len()
    );

    if let Some(pref) = preference {
        if let Err(e) = state.preferences.mark_used(user_id, pref.id).await {
            warn!("Could not record use of job preference {}: {e}", pref.id);
        }
    }
    if let Err(e) = tasks::enqueue(
        &state.db,
        Task::BestAnswers {
            interview_id: created.interview.id,
        },
    )
    .await
    {
        warn!("Could not queue best answers for interview {}: {e}", created.interview.id);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedLlm;
    use serde_json::json;

    fn bank() -> SimulatedInterview {
        SimulatedInterview::from_value(&json!({
            "architecture": ["如何拆分单体应用？"],
            "techDepth": {"React": ["解释 Fiber 架构", "Hooks 的闭包陷阱"], "Go": ["GMP 调度模型"]},
            "algorithms": ["实现 LRU 缓存"],
            "behavioral": ["讲一次冲突处理的经历"]
        }))
        .unwrap()
    }

    #[test]
    fn test_bank_selection_round_robins_categories() {
        let picked = select_bank_questions(&bank(), InterviewType::Technical, 4);
        let categories: Vec<&str> = picked.iter().map(|q| q.category.as_str()).collect();
        assert_eq!(categories, vec!["技术深度·Go", "算法", "架构设计", "行为面试"]);
        assert!(picked.iter().all(|q| q.source == QuestionSource::Bank));
        assert_eq!(picked[1].question_type, QuestionType::Algorithm);
        assert_eq!(picked[2].question_type, QuestionType::SystemDesign);
    }

    #[test]
    fn test_bank_selection_stops_when_exhausted() {
        let picked = select_bank_questions(&bank(), InterviewType::Behavioral, 50);
        assert_eq!(picked.len(), bank().total_questions());
        assert_eq!(picked[0].question_type, QuestionType::Behavioral);
    }

    #[test]
    fn test_parse_generated_questions_accepts_aliases() {
        let value = json!({"questions": [
            {"question": "什么是闭包？", "type": "technical_knowledge", "difficulty": "easy"},
            {"content": "", "type": "coding"},
            "设计短链服务"
        ]});
        let parsed = parse_generated_questions(&value, 5).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].content, "什么是闭包？");
        assert_eq!(parsed[0].difficulty, Difficulty::Easy);
        assert_eq!(parsed[1].content, "设计短链服务");
        assert!(parse_generated_questions(&json!({"questions": []}), 5).is_none());
        assert!(parse_generated_questions(&json!({"items": ["x"]}), 5).is_none());
    }

    #[tokio::test]
    async fn test_realtime_uses_llm_questions() {
        let llm = ScriptedLlm::new().reply(
            "```json\n{\"questions\": [{\"content\": \"Redis 持久化方式？\", \"type\": \"technical-knowledge\"}]}\n```",
        );
        let ctx = question_context(None, None, InterviewType::Technical, 3);
        let (questions, source) = realtime_questions(&llm, &ctx, None).await.unwrap();
        assert_eq!(source, QuestionSource::Generated);
        assert_eq!(questions[0].content, "Redis 持久化方式？");
        assert!(llm.prompts.lock().unwrap()[0].contains("软件工程师"));
    }

    #[tokio::test]
    async fn test_realtime_falls_back_to_bank() {
        let llm = ScriptedLlm::new().fail(502);
        let bank = bank();
        let ctx = question_context(None, None, InterviewType::Technical, 2);
        let (questions, source) = realtime_questions(&llm, &ctx, Some(&bank)).await.unwrap();
        assert_eq!(source, QuestionSource::Bank);
        assert_eq!(questions.len(), 2);
    }

    #[tokio::test]
    async fn test_realtime_without_bank_is_upstream_error() {
        let llm = ScriptedLlm::new().reply("抱歉，我无法生成题目");
        let ctx = question_context(None, None, InterviewType::Technical, 2);
        let err = realtime_questions(&llm, &ctx, None).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_request_count_is_clamped() {
        let req = GenerateRequest {
            question_count: Some(99),
            ..Default::default()
        };
        assert_eq!(req.count(), MAX_QUESTION_COUNT);
        assert_eq!(GenerateRequest::default().count(), DEFAULT_QUESTION_COUNT);
    }
}
