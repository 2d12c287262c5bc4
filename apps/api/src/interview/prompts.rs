// Interview prompts: question generation, answer evaluation, follow-up, best
// answer, answer comparison and report narrative. Every reply goes through
// `analysis::repair::parse_llm_json`.

use crate::llm_client::prompts::{bullet_list, section, JSON_ONLY_INSTRUCTION};
use crate::models::interview::{InterviewType, QuestionRow};

/// What the question generator knows about the candidate and the target job.
#[derive(Debug, Clone, Default)]
pub struct QuestionContext {
    pub position: String,
    pub level: String,
    pub company: String,
    pub requirements: Option<String>,
    pub interview_type: InterviewType,
    pub count: usize,
    pub experience_level: Option<String>,
    pub tech_stack: Vec<String>,
    pub specializations: Vec<String>,
}

pub fn build_question_generation_prompt(ctx: &QuestionContext) -> String {
    let mut prompt = format!(
        "请为下面的候选人生成 {} 道{}面试题，难度需与目标职级匹配，题目之间不要重复。\n\n",
        ctx.count,
        match ctx.interview_type {
            InterviewType::Technical => "技术",
            InterviewType::Behavioral => "行为",
            InterviewType::SystemDesign => "系统设计",
        }
    );

    let mut job = format!("职位：{}\n职级：{}", ctx.position, ctx.level);
    if !ctx.company.is_empty() {
        job.push_str(&format!("\n公司：{}", ctx.company));
    }
    if let Some(req) = ctx.requirements.as_deref().filter(|r| !r.trim().is_empty()) {
        job.push_str(&format!("\n岗位要求：{req}"));
    }
    prompt.push_str(&section("目标岗位", &job));

    let mut candidate = String::new();
    if let Some(level) = &ctx.experience_level {
        candidate.push_str(&format!("经验水平：{level}\n"));
    }
    if !ctx.tech_stack.is_empty() {
        candidate.push_str(&format!("核心技术栈：{}\n", ctx.tech_stack.join("、")));
    }
    if !ctx.specializations.is_empty() {
        candidate.push_str(&format!("专业方向：{}", ctx.specializations.join("、")));
    }
    prompt.push_str(&section("候选人画像", &candidate));

    prompt.push_str(
        "## 返回格式\n\
         {\"questions\": [{\"content\": \"题目内容\", \
         \"type\": \"coding | algorithm | technical-knowledge | behavioral | system-design | scenario\", \
         \"difficulty\": \"easy | medium | hard | expert\", \"category\": \"考察方向\"}]}\n\n",
    );
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

pub fn build_evaluation_prompt(question: &QuestionRow, answer: &str) -> String {
    let mut prompt = String::from("请作为面试官评估候选人对下面这道题的回答，给出客观评分与改进建议。\n\n");
    prompt.push_str(&section(
        "题目",
        &format!(
            "{}\n（类型：{}，难度：{}）",
            question.content, question.question_type, question.difficulty
        ),
    ));
    prompt.push_str(&section("候选人回答", answer));
    prompt.push_str(
        "## 评分标准\n\
         - 90-100：全面准确，有深度与实践洞察\n\
         - 75-89：基本正确，细节或深度略有欠缺\n\
         - 60-74：方向正确但不完整\n\
         - 0-59：存在明显错误或答非所问\n\n\
         ## 返回格式\n\
         {\"score\": 0-100 的整数, \"feedback\": \"总体评价\", \"strengths\": [\"优点\"], \
         \"improvements\": [\"不足\"], \"suggestions\": [\"改进建议\"]}\n\n",
    );
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

pub fn build_follow_up_prompt(question: &QuestionRow, answer: &str, score: f64) -> String {
    let mut prompt = String::from("基于候选人的回答，提出一个有针对性的追问，用于考察其理解深度。\n\n");
    prompt.push_str(&section("原题", &question.content));
    prompt.push_str(&section("候选人回答", answer));
    prompt.push_str(&section("本题得分", &format!("{score:.0}")));
    prompt.push_str("## 返回格式\n{\"followUp\": \"追问内容\"}\n\n");
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

pub fn build_best_answer_prompt(question: &QuestionRow) -> String {
    let mut prompt = String::from("请为下面的面试题写一份高质量的参考答案，结构清晰、要点完整，可适当给出示例。\n\n");
    prompt.push_str(&section(
        "题目",
        &format!(
            "{}\n（类型：{}，难度：{}，方向：{}）",
            question.content, question.question_type, question.difficulty, question.category
        ),
    ));
    prompt.push_str("## 返回格式\n{\"answer\": \"参考答案\"}\n\n");
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

pub fn build_comparison_prompt(question: &QuestionRow, current: &str, candidate: &str) -> String {
    let mut prompt = String::from("请比较同一道面试题的两份答案，判断候选答案是否优于当前参考答案。\n\n");
    prompt.push_str(&section("题目", &question.content));
    prompt.push_str(&section("当前参考答案", current));
    prompt.push_str(&section("候选答案", candidate));
    prompt.push_str(
        "## 返回格式\n\
         {\"isBetter\": true 或 false, \"confidence\": 0-100 的整数, \"reason\": \"判断理由\"}\n\n",
    );
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

/// One answered question as shown to the report writer.
pub struct ReportItem<'a> {
    pub question: &'a QuestionRow,
}

pub fn build_report_prompt(position: &str, scores: &str, items: &[ReportItem<'_>]) -> String {
    let mut prompt = String::from("请根据以下模拟面试记录撰写面试总结报告。\n\n");
    prompt.push_str(&section("面试岗位", position));
    prompt.push_str(&section("各维度得分", scores));

    let records: Vec<String> = items
        .iter()
        .map(|item| {
            let q = item.question;
            format!(
                "[{}] {}\n  回答：{}\n  得分：{}",
                q.question_type,
                q.content,
                q.user_answer.as_deref().unwrap_or("（未作答）"),
                q.score.map(|s| format!("{s:.0}")).unwrap_or_else(|| "-".to_string())
            )
        })
        .collect();
    prompt.push_str(&section("答题记录", &bullet_list(&records)));

    prompt.push_str(
        "## 返回格式\n\
         {\"strengths\": [\"优势\"], \"weaknesses\": [\"不足\"], \"recommendations\": [\"建议\"], \
         \"detailedAnalysis\": {\"summary\": \"总体评价\", \"technicalDepth\": \"技术深度分析\", \
         \"communication\": \"表达与沟通分析\", \"nextSteps\": \"后续学习路线\"}}\n\n",
    );
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interview::{question, QuestionType};

    #[test]
    fn test_generation_prompt_embeds_job_and_candidate() {
        let ctx = QuestionContext {
            position: "后端工程师".into(),
            level: "senior".into(),
            company: "美团".into(),
            requirements: Some("熟悉高并发".into()),
            interview_type: InterviewType::Technical,
            count: 5,
            experience_level: Some("mid".into()),
            tech_stack: vec!["Go".into(), "Redis".into()],
            specializations: vec![],
        };
        let prompt = build_question_generation_prompt(&ctx);
        assert!(prompt.contains("生成 5 道技术面试题"));
        assert!(prompt.contains("公司：美团"));
        assert!(prompt.contains("岗位要求：熟悉高并发"));
        assert!(prompt.contains("核心技术栈：Go、Redis"));
        assert!(prompt.ends_with(JSON_ONLY_INSTRUCTION));
    }

    #[test]
    fn test_evaluation_prompt_includes_answer_and_rubric() {
        let q = question(1, QuestionType::Algorithm);
        let prompt = build_evaluation_prompt(&q, "用双指针");
        assert!(prompt.contains("用双指针"));
        assert!(prompt.contains("类型：algorithm"));
        assert!(prompt.contains("\"score\""));
    }

    #[test]
    fn test_report_prompt_marks_unanswered() {
        let q = question(1, QuestionType::Behavioral);
        let prompt = build_report_prompt("前端", "总分 0", &[ReportItem { question: &q }]);
        assert!(prompt.contains("（未作答）"));
        assert!(prompt.contains("得分：-"));
    }
}
