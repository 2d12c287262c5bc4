// Résumé analysis prompt. The schema below is the only contract the model sees;
// `repair::normalize_analysis` and `AiProfile::from_value` enforce it on the way back.

use crate::document::BasicAnalysis;
use crate::llm_client::prompts::{bullet_list, section, JSON_ONLY_INSTRUCTION};

/// Résumé text beyond this many characters is cut before prompting.
pub const MAX_RESUME_CHARS: usize = 12_000;

const ANALYSIS_SCHEMA: &str = r#"{
  "experienceLevel": "junior | mid | senior | lead",
  "experienceLevelConfidence": 0.85,
  "specializations": ["后端开发", "分布式系统"],
  "techStack": [
    {
      "technology": "Go",
      "category": "language | framework | database | tool | platform | other",
      "proficiency": "junior | mid | senior | expert",
      "dominanceScore": 92,
      "evidenceCount": 4,
      "lastUsed": "2024"
    }
  ],
  "projectAnalysis": [
    {
      "projectName": "项目名称",
      "description": "一句话描述",
      "techStack": ["Go", "Redis"],
      "complexity": "simple | medium | high | very-high",
      "impact": "业务影响",
      "role": "候选人角色",
      "highlights": ["亮点"],
      "interviewQuestions": ["针对该项目的面试问题"]
    }
  ],
  "techHighlights": ["技术亮点"],
  "careerSuggestions": ["职业发展建议"],
  "roleMatchingAnalysis": {"后端工程师": 88, "全栈工程师": 70},
  "skillAssessment": {"技术深度": 80, "技术广度": 70, "系统设计": 65, "项目经验": 75},
  "simulatedInterview": {
    "architecture": ["架构设计问题"],
    "techDepth": {"Go": ["针对该技术的深度问题"]},
    "algorithms": ["算法问题"],
    "projectExperience": ["项目经验问题"],
    "systemDesign": ["系统设计问题"],
    "behavioral": ["行为面试问题"]
  }
}"#;

pub fn build_resume_analysis_prompt(filtered_text: &str, basic: &BasicAnalysis) -> String {
    let mut prompt = String::from(
        "请作为资深技术面试官，深入分析下面这份简历（敏感信息已脱敏），\
         评估候选人的技术栈、项目经验和职级，并为后续模拟面试准备题库。\n\n",
    );

    prompt.push_str(&section("简历正文", &truncate_chars(filtered_text, MAX_RESUME_CHARS)));
    prompt.push_str(&section("已识别的技术关键词", &basic.tech_keywords.join("、")));

    let projects: Vec<String> = basic
        .projects
        .iter()
        .map(|p| {
            if p.technologies.is_empty() {
                p.name.clone()
            } else {
                format!("{}（{}）", p.name, p.technologies.join(", "))
            }
        })
        .collect();
    prompt.push_str(&section("已识别的项目", &bullet_list(&projects)));

    let work: Vec<String> = basic
        .work_experience
        .iter()
        .map(|w| format!("{} {} {}", w.duration, w.company, w.position))
        .collect();
    prompt.push_str(&section("已识别的工作经历", &bullet_list(&work)));

    prompt.push_str(
        "## 分析要求\n\
         1. techStack 按 dominanceScore（0-100）从高到低排列，分数反映该技术在简历中的主导程度\n\
         2. experienceLevelConfidence 取值 0 到 1\n\
         3. roleMatchingAnalysis 与 skillAssessment 的分值均为 0-100\n\
         4. simulatedInterview 每个类别 3-5 道题，techDepth 按技术名分组，问题需紧扣简历内容\n\
         5. 只依据简历中出现的事实，不要编造经历\n\n",
    );
    prompt.push_str("## 返回格式\n");
    prompt.push_str(ANALYSIS_SCHEMA);
    prompt.push_str("\n\n");
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::extract::ProjectInfo;

    #[test]
    fn test_prompt_embeds_text_keywords_and_schema() {
        let basic = BasicAnalysis {
            tech_keywords: vec!["React".into(), "Redis".into()],
            projects: vec![ProjectInfo {
                name: "电商中台".into(),
                description: String::new(),
                technologies: vec!["React".into()],
            }],
            work_experience: vec![],
        };
        let prompt = build_resume_analysis_prompt("熟悉 React [手机号已隐藏]", &basic);
        assert!(prompt.contains("熟悉 React [手机号已隐藏]"));
        assert!(prompt.contains("React、Redis"));
        assert!(prompt.contains("- 电商中台（React）"));
        assert!(prompt.contains("## 已识别的工作经历\n（无）"));
        assert!(prompt.contains("\"simulatedInterview\""));
        assert!(prompt.ends_with(JSON_ONLY_INSTRUCTION));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("简历内容", 2), "简历");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
