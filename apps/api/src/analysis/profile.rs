//! Typed view of an AI profile.
//!
//! LLM output is untrusted: `AiProfile::from_value` reads whatever fields are
//! present, coerces numbers given as strings, clamps ranges and maps unknown
//! enum labels to a neutral variant instead of failing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Junior,
    Mid,
    Senior,
    Lead,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Lead => "lead",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "junior" | "entry" | "初级" | "初级工程师" => Some(ExperienceLevel::Junior),
            "mid" | "middle" | "intermediate" | "中级" | "中级工程师" => Some(ExperienceLevel::Mid),
            "senior" | "高级" | "资深" | "高级工程师" => Some(ExperienceLevel::Senior),
            "lead" | "principal" | "staff" | "专家" | "技术负责人" => Some(ExperienceLevel::Lead),
            _ => None,
        }
    }
}

/// Technology category. Serialized with the Chinese display label the UI shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TechCategory {
    #[serde(rename = "编程语言", alias = "language")]
    Language,
    #[serde(rename = "框架", alias = "framework")]
    Framework,
    #[serde(rename = "数据库", alias = "database")]
    Database,
    #[serde(rename = "工具", alias = "tool")]
    Tool,
    #[serde(rename = "平台", alias = "platform")]
    Platform,
    #[default]
    #[serde(rename = "其他", alias = "other")]
    Other,
}

impl TechCategory {
    pub fn label(&self) -> &'static str {
        match self {
            TechCategory::Language => "编程语言",
            TechCategory::Framework => "框架",
            TechCategory::Database => "数据库",
            TechCategory::Tool => "工具",
            TechCategory::Platform => "平台",
            TechCategory::Other => "其他",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "language" | "编程语言" | "语言" => TechCategory::Language,
            "framework" | "框架" | "库" | "library" => TechCategory::Framework,
            "database" | "数据库" | "存储" => TechCategory::Database,
            "tool" | "tools" | "工具" => TechCategory::Tool,
            "platform" | "平台" | "云平台" | "cloud" => TechCategory::Platform,
            _ => TechCategory::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proficiency {
    Junior,
    #[default]
    Mid,
    Senior,
    Expert,
}

impl Proficiency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Proficiency::Junior => "junior",
            Proficiency::Mid => "mid",
            Proficiency::Senior => "senior",
            Proficiency::Expert => "expert",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "junior" | "beginner" | "初级" | "了解" => Proficiency::Junior,
            "senior" | "advanced" | "高级" | "精通" => Proficiency::Senior,
            "expert" | "专家" => Proficiency::Expert,
            _ => Proficiency::Mid,
        }
    }
}

impl From<ExperienceLevel> for Proficiency {
    fn from(level: ExperienceLevel) -> Self {
        match level {
            ExperienceLevel::Junior => Proficiency::Junior,
            ExperienceLevel::Mid => Proficiency::Mid,
            ExperienceLevel::Senior | ExperienceLevel::Lead => Proficiency::Senior,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::High => "high",
            Complexity::VeryHigh => "very-high",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace('_', "-").as_str() {
            "simple" | "low" | "简单" => Complexity::Simple,
            "high" | "高" | "复杂" => Complexity::High,
            "very-high" | "veryhigh" | "极高" | "非常复杂" => Complexity::VeryHigh,
            _ => Complexity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStackItem {
    pub technology: String,
    pub category: TechCategory,
    pub proficiency: Proficiency,
    /// 0–100.
    pub value_score: i32,
    pub evidence_count: i32,
    pub last_used: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalysis {
    pub project_name: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub complexity: Complexity,
    pub impact: String,
    pub role: String,
    pub highlights: Vec<String>,
    pub interview_questions: Vec<String>,
}

/// One category of the question bank: a flat list, or (for tech depth) a list per technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BankCategory {
    Flat(Vec<String>),
    ByTech(BTreeMap<String, Vec<String>>),
}

/// A single question drawn from the bank, with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BankQuestion {
    pub category: String,
    pub technology: Option<String>,
    pub content: String,
}

/// Pre-generated question bank keyed by category (`architecture`, `techDepth`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulatedInterview {
    pub categories: BTreeMap<String, BankCategory>,
}

impl SimulatedInterview {
    /// Reads a bank from untrusted JSON; `None` when no category holds a question.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut categories = BTreeMap::new();
        for (key, entry) in obj {
            match entry {
                Value::Array(_) => {
                    let list = string_list(entry);
                    if !list.is_empty() {
                        categories.insert(key.clone(), BankCategory::Flat(list));
                    }
                }
                Value::Object(by_tech) => {
                    let map: BTreeMap<String, Vec<String>> = by_tech
                        .iter()
                        .map(|(tech, qs)| (tech.clone(), string_list(qs)))
                        .filter(|(_, qs)| !qs.is_empty())
                        .collect();
                    if !map.is_empty() {
                        categories.insert(key.clone(), BankCategory::ByTech(map));
                    }
                }
                _ => {}
            }
        }
        if categories.is_empty() {
            None
        } else {
            Some(Self { categories })
        }
    }

    /// Questions of one category, flattened.
    pub fn questions_in(&self, category: &str) -> Vec<BankQuestion> {
        match self.categories.get(category) {
            Some(BankCategory::Flat(list)) => list
                .iter()
                .map(|q| BankQuestion {
                    category: category.to_string(),
                    technology: None,
                    content: q.clone(),
                })
                .collect(),
            Some(BankCategory::ByTech(map)) => map
                .iter()
                .flat_map(|(tech, qs)| {
                    qs.iter().map(move |q| BankQuestion {
                        category: category.to_string(),
                        technology: Some(tech.clone()),
                        content: q.clone(),
                    })
                })
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn total_questions(&self) -> usize {
        self.categories
            .values()
            .map(|c| match c {
                BankCategory::Flat(list) => list.len(),
                BankCategory::ByTech(map) => map.values().map(Vec::len).sum(),
            })
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiProfile {
    pub experience_level: ExperienceLevel,
    pub experience_level_confidence: f64,
    pub specializations: Vec<String>,
    #[serde(serialize_with = "serialize_by_value_score")]
    pub tech_stack: Vec<TechStackItem>,
    pub project_analysis: Vec<ProjectAnalysis>,
    pub tech_highlights: Vec<String>,
    pub career_suggestions: Vec<String>,
    pub role_matching_analysis: BTreeMap<String, f64>,
    pub skill_assessment: BTreeMap<String, f64>,
    /// `None` means "no bank available"; the UI hides the section.
    pub simulated_interview: Option<SimulatedInterview>,
}

/// The tech stack always renders strongest first, whatever order it was stored in.
fn serialize_by_value_score<S: Serializer>(
    items: &[TechStackItem],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut sorted: Vec<&TechStackItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.value_score.cmp(&a.value_score));
    serializer.collect_seq(sorted)
}

impl AiProfile {
    /// Builds a profile from a normalized analysis object (see `repair::normalize_analysis`).
    pub fn from_value(value: &Value) -> Self {
        let experience_level = value
            .get("experienceLevel")
            .and_then(Value::as_str)
            .and_then(ExperienceLevel::parse)
            .unwrap_or_default();

        let experience_level_confidence = value
            .get("experienceLevelConfidence")
            .and_then(number)
            .map(|c| if c > 1.0 { c / 100.0 } else { c })
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);

        let tech_stack = value
            .get("techStack")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(tech_item).collect())
            .unwrap_or_default();

        let project_analysis = value
            .get("projectAnalysis")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(project_item).collect())
            .unwrap_or_default();

        AiProfile {
            experience_level,
            experience_level_confidence,
            specializations: field_list(value, "specializations"),
            tech_stack,
            project_analysis,
            tech_highlights: field_list(value, "techHighlights"),
            career_suggestions: field_list(value, "careerSuggestions"),
            role_matching_analysis: score_map(value.get("roleMatchingAnalysis")),
            skill_assessment: score_map(value.get("skillAssessment")),
            simulated_interview: value
                .get("simulatedInterview")
                .and_then(SimulatedInterview::from_value),
        }
    }
}

fn tech_item(item: &Value) -> Option<TechStackItem> {
    let technology = item
        .get("technology")
        .or_else(|| item.get("name"))
        .and_then(Value::as_str)?
        .trim()
        .to_string();
    if technology.is_empty() {
        return None;
    }
    let score = item
        .get("dominanceScore")
        .or_else(|| item.get("valueScore"))
        .and_then(number)
        .unwrap_or(50.0);
    Some(TechStackItem {
        technology,
        category: item
            .get("category")
            .and_then(Value::as_str)
            .map(TechCategory::parse)
            .unwrap_or_default(),
        proficiency: item
            .get("proficiency")
            .and_then(Value::as_str)
            .map(Proficiency::parse)
            .unwrap_or_default(),
        value_score: score.round().clamp(0.0, 100.0) as i32,
        evidence_count: item
            .get("evidenceCount")
            .and_then(number)
            .map(|n| n.max(0.0) as i32)
            .unwrap_or(0),
        last_used: str_field(item, "lastUsed"),
    })
}

fn project_item(item: &Value) -> Option<ProjectAnalysis> {
    let project_name = item
        .get("projectName")
        .or_else(|| item.get("name"))
        .and_then(Value::as_str)?
        .trim()
        .to_string();
    if project_name.is_empty() {
        return None;
    }
    Some(ProjectAnalysis {
        project_name,
        description: str_field(item, "description"),
        tech_stack: field_list(item, "techStack"),
        complexity: item
            .get("complexity")
            .and_then(Value::as_str)
            .map(Complexity::parse)
            .unwrap_or_default(),
        impact: str_field(item, "impact"),
        role: str_field(item, "role"),
        highlights: field_list(item, "highlights"),
        interview_questions: field_list(item, "interviewQuestions"),
    })
}

/// Reads a number that may arrive as a JSON number or a numeric string ("85", "85%").
/// Finite numbers only; `"NaN"` and `"inf"` strings read as absent.
pub fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

pub fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub fn field_list(value: &Value, key: &str) -> Vec<String> {
    value.get(key).map(string_list).unwrap_or_default()
}

/// Strings of an array (non-string items skipped); a lone string becomes a one-item list.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn score_map(value: Option<&Value>) -> BTreeMap<String, f64> {
    value
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| number(v).map(|n| (k.clone(), n.clamp(0.0, 100.0))))
                .collect()
        })
        .unwrap_or_default()
}
