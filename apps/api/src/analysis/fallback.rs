//! A local, LLM-free approximation of the AI profile.
//!
//! Used whenever the LLM path fails. It never produces a question bank.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::profile::{AiProfile, ExperienceLevel, Proficiency, TechCategory, TechStackItem};
use crate::document::extract::find_term;

pub const FALLBACK_CONFIDENCE: f64 = 0.4;

const KNOWN_TECHNOLOGIES: &[(&str, TechCategory)] = &[
    ("JavaScript", TechCategory::Language),
    ("TypeScript", TechCategory::Language),
    ("Python", TechCategory::Language),
    ("Java", TechCategory::Language),
    ("Go", TechCategory::Language),
    ("C++", TechCategory::Language),
    ("React", TechCategory::Framework),
    ("Vue", TechCategory::Framework),
    ("Angular", TechCategory::Framework),
    ("Node.js", TechCategory::Framework),
    ("Spring", TechCategory::Framework),
    ("Django", TechCategory::Framework),
    ("MySQL", TechCategory::Database),
    ("PostgreSQL", TechCategory::Database),
    ("MongoDB", TechCategory::Database),
    ("Redis", TechCategory::Database),
    ("Docker", TechCategory::Tool),
    ("Git", TechCategory::Tool),
    ("Kubernetes", TechCategory::Platform),
    ("AWS", TechCategory::Platform),
];

const LEAD_MARKERS: &[&str] = &["技术总监", "团队负责人"];
const SENIOR_MARKERS: &[&str] = &["架构师", "高级", "资深", "技术负责人"];

static YEARS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]+)\s*\+?\s*(?:年|years?)").unwrap());

/// Builds a low-confidence profile from keyword matches. Total; never panics.
pub fn analyze(text: &str) -> AiProfile {
    let lower = text.to_lowercase();
    let level = experience_level(text);
    let proficiency = Proficiency::from(level);

    let tech_stack: Vec<TechStackItem> = KNOWN_TECHNOLOGIES
        .iter()
        .filter(|(name, _)| find_term(&lower, &name.to_lowercase()).is_some())
        .enumerate()
        .map(|(i, (name, category))| TechStackItem {
            technology: name.to_string(),
            category: *category,
            proficiency,
            value_score: (90 - 4 * i as i32).max(10),
            evidence_count: occurrences(&lower, &name.to_lowercase()),
            last_used: "近期".to_string(),
        })
        .collect();

    let has = |category: TechCategory| tech_stack.iter().any(|t| t.category == category);
    let mut specializations = Vec::new();
    if has(TechCategory::Framework) && ["React", "Vue", "Angular"].iter().any(|f| contains(&tech_stack, f)) {
        specializations.push("前端开发".to_string());
    }
    if has(TechCategory::Database) || ["Spring", "Django", "Node.js"].iter().any(|f| contains(&tech_stack, f)) {
        specializations.push("后端开发".to_string());
    }
    if has(TechCategory::Platform) || contains(&tech_stack, "Docker") {
        specializations.push("云原生与DevOps".to_string());
    }
    if specializations.is_empty() {
        specializations.push("软件开发".to_string());
    }

    let tech_highlights = if tech_stack.is_empty() {
        vec!["简历中未识别到明确的技术栈，建议补充技术细节".to_string()]
    } else {
        tech_stack
            .iter()
            .take(3)
            .map(|t| format!("具备{}（{}）实践经验", t.technology, t.category.label()))
            .collect()
    };

    let role_matching_analysis: BTreeMap<String, f64> = specializations
        .iter()
        .map(|s| {
            let role = match s.as_str() {
                "前端开发" => "前端工程师",
                "后端开发" => "后端工程师",
                "云原生与DevOps" => "DevOps工程师",
                _ => "软件工程师",
            };
            (role.to_string(), 60.0)
        })
        .collect();

    let breadth = (40 + 5 * tech_stack.len() as i32).min(90) as f64;
    let depth = match level {
        ExperienceLevel::Junior => 45.0,
        ExperienceLevel::Mid => 60.0,
        ExperienceLevel::Senior => 75.0,
        ExperienceLevel::Lead => 80.0,
    };
    let skill_assessment = BTreeMap::from([
        ("技术广度".to_string(), breadth),
        ("技术深度".to_string(), depth),
        ("项目经验".to_string(), depth),
    ]);

    AiProfile {
        experience_level: level,
        experience_level_confidence: FALLBACK_CONFIDENCE,
        specializations,
        tech_stack,
        project_analysis: Vec::new(),
        tech_highlights,
        career_suggestions: career_suggestions(level),
        role_matching_analysis,
        skill_assessment,
        simulated_interview: None,
    }
}

/// Title keywords win over stated years; years come from the largest plausible `N年` marker.
pub fn experience_level(text: &str) -> ExperienceLevel {
    if LEAD_MARKERS.iter().any(|m| text.contains(m)) {
        return ExperienceLevel::Lead;
    }
    if SENIOR_MARKERS.iter().any(|m| text.contains(m)) {
        return ExperienceLevel::Senior;
    }
    let years = YEARS_MARKER
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .filter(|n| *n <= 40)
        .max()
        .unwrap_or(0);
    match years {
        n if n >= 8 => ExperienceLevel::Senior,
        n if n >= 3 => ExperienceLevel::Mid,
        _ => ExperienceLevel::Junior,
    }
}

fn career_suggestions(level: ExperienceLevel) -> Vec<String> {
    let items: &[&str] = match level {
        ExperienceLevel::Junior => &[
            "夯实计算机基础与数据结构算法",
            "深入掌握一门主力语言及其生态",
            "积累完整的项目交付经验",
        ],
        ExperienceLevel::Mid => &[
            "在核心技术栈上形成深度，理解底层原理",
            "主导模块级设计，提升系统设计能力",
            "关注性能优化与工程质量",
        ],
        ExperienceLevel::Senior | ExperienceLevel::Lead => &[
            "沉淀架构设计方法论，主导跨团队技术方案",
            "培养团队成员，提升技术影响力",
            "结合业务目标规划技术路线",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

fn contains(stack: &[TechStackItem], name: &str) -> bool {
    stack.iter().any(|t| t.technology == name)
}

fn occurrences(haystack: &str, term: &str) -> i32 {
    let mut count = 0;
    let mut from = 0;
    while let Some(pos) = find_term(&haystack[from..], term) {
        count += 1;
        from += pos + term.len();
    }
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_profile_without_bank() {
        let profile = analyze("");
        assert!(profile.simulated_interview.is_none());
        assert!(profile.tech_stack.is_empty());
        assert_eq!(profile.experience_level, ExperienceLevel::Junior);
        assert_eq!(profile.experience_level_confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_react_five_years_is_mid_framework() {
        let profile = analyze("前端工程师，5年工作经验，熟练使用 React 与 TypeScript。");
        assert_eq!(profile.experience_level, ExperienceLevel::Mid);
        let react = profile
            .tech_stack
            .iter()
            .find(|t| t.technology == "React")
            .unwrap();
        assert_eq!(react.category, TechCategory::Framework);
        assert_eq!(serde_json::to_value(react.category).unwrap(), "框架");
        assert!(profile.simulated_interview.is_none());
    }

    #[test]
    fn test_value_scores_descend_by_match_order() {
        let profile = analyze("Python Java MySQL Docker");
        let scores: Vec<i32> = profile.tech_stack.iter().map(|t| t.value_score).collect();
        assert_eq!(scores, vec![90, 86, 82, 78]);
    }

    #[test]
    fn test_java_not_matched_inside_javascript() {
        let profile = analyze("精通 JavaScript");
        assert_eq!(profile.tech_stack.len(), 1);
        assert_eq!(profile.tech_stack[0].technology, "JavaScript");
    }

    #[test]
    fn test_experience_level_markers() {
        assert_eq!(experience_level("资深后端工程师"), ExperienceLevel::Senior);
        assert_eq!(experience_level("高级前端，2年经验"), ExperienceLevel::Senior);
        assert_eq!(experience_level("技术总监"), ExperienceLevel::Lead);
        assert_eq!(experience_level("10年开发经验"), ExperienceLevel::Senior);
        assert_eq!(experience_level("3 years of Go"), ExperienceLevel::Mid);
        assert_eq!(experience_level("1年实习"), ExperienceLevel::Junior);
    }

    #[test]
    fn test_calendar_years_are_not_experience() {
        assert_eq!(experience_level("2019年毕业，2020年入职"), ExperienceLevel::Junior);
    }

    #[test]
    fn test_evidence_counts_occurrences() {
        let profile = analyze("React 项目；另一个 React 项目；react hooks");
        assert_eq!(profile.tech_stack[0].evidence_count, 3);
    }
}
