//! Coarse structured fields pulled from résumé text with keyword and regex heuristics.
//! This is the "basic analysis" returned alongside the upload, independent of the LLM.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    pub duration: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAnalysis {
    /// Ordered by first appearance in the text.
    pub tech_keywords: Vec<String>,
    pub projects: Vec<ProjectInfo>,
    pub work_experience: Vec<WorkExperience>,
}

const TECH_KEYWORDS: &[&str] = &[
    "JavaScript", "TypeScript", "Python", "Java", "Go", "Golang", "Rust", "C++", "C#", "PHP",
    "Kotlin", "Swift", "React", "Vue", "Angular", "Next.js", "Node.js", "Express", "Spring",
    "Spring Boot", "Django", "Flask", "MyBatis", "MySQL", "PostgreSQL", "MongoDB", "Redis",
    "Elasticsearch", "Kafka", "RabbitMQ", "Docker", "Kubernetes", "Nginx", "Linux", "Git",
    "Webpack", "AWS", "阿里云", "微服务", "分布式", "TensorFlow", "PyTorch", "GraphQL", "gRPC",
];

const MAX_DESCRIPTION_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Other,
    Projects,
    Work,
}

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)((?:19|20)[0-9]{2}(?:\s*[./\-年]\s*[0-9]{1,2}\s*月?)?)\s*(?:-|–|—|~|～|至|到)\s*((?:19|20)[0-9]{2}(?:\s*[./\-年]\s*[0-9]{1,2}\s*月?)?|至今|现在|今|present|now)",
    )
    .unwrap()
});

static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-•·*●▪]|[0-9]{1,2}[.、)])\s*").unwrap());

/// Finds known technology names, case-insensitively, respecting word boundaries
/// for ASCII names ("Java" does not match inside "JavaScript").
pub fn find_tech_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut found: Vec<(usize, &str)> = TECH_KEYWORDS
        .iter()
        .filter_map(|kw| find_term(&lower, &kw.to_lowercase()).map(|pos| (pos, *kw)))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    let mut out: Vec<String> = Vec::new();
    for (_, kw) in found {
        if !out.iter().any(|k| k == kw) {
            out.push(kw.to_string());
        }
    }
    out
}

/// Position of the first boundary-respecting occurrence of `term` in `haystack`.
/// Both arguments must already be lowercased.
pub fn find_term(haystack: &str, term: &str) -> Option<usize> {
    let needs_left = term.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let needs_right = term.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());

    let mut from = 0;
    while let Some(rel) = haystack[from..].find(term) {
        let start = from + rel;
        let end = start + term.len();
        let left_ok = !needs_left
            || !haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        let right_ok = !needs_right
            || !haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '+' || c == '#');
        if left_ok && right_ok {
            return Some(start);
        }
        from = start + term.chars().next().map(char::len_utf8).unwrap_or(1);
    }
    None
}

pub fn extract_basic_info(text: &str) -> BasicAnalysis {
    let mut projects: Vec<ProjectInfo> = Vec::new();
    let mut work: Vec<WorkExperience> = Vec::new();
    let mut section = Section::Other;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(next) = section_header(line) {
            section = next;
            continue;
        }

        match section {
            Section::Projects => {
                // A short non-bullet line opens a new project unless the current one
                // is still waiting for its first description line.
                let is_bullet = BULLET_PREFIX.is_match(line);
                let awaiting_description = projects
                    .last()
                    .is_some_and(|p| p.description.is_empty());
                let opens_project = !is_bullet
                    && line.chars().count() <= 40
                    && (!awaiting_description || DATE_RANGE.is_match(line));
                if opens_project {
                    let name = DATE_RANGE.replace_all(line, "").trim().to_string();
                    projects.push(ProjectInfo {
                        name: if name.is_empty() { line.to_string() } else { name },
                        ..Default::default()
                    });
                } else if let Some(current) = projects.last_mut() {
                    append_description(&mut current.description, &BULLET_PREFIX.replace(line, ""));
                }
            }
            Section::Work => {
                if let Some(caps) = DATE_RANGE.captures(line) {
                    let duration = format!("{} - {}", caps[1].trim(), caps[2].trim());
                    let rest = DATE_RANGE.replace(line, " ");
                    let mut parts = rest
                        .split(|c: char| c.is_whitespace() || c == '|' || c == '｜' || c == '，' || c == ',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty());
                    work.push(WorkExperience {
                        company: parts.next().unwrap_or_default().to_string(),
                        position: parts.next().unwrap_or_default().to_string(),
                        duration,
                        description: String::new(),
                    });
                } else if let Some(current) = work.last_mut() {
                    append_description(&mut current.description, &BULLET_PREFIX.replace(line, ""));
                }
            }
            Section::Other => {}
        }
    }

    for project in &mut projects {
        let haystack = format!("{} {}", project.name, project.description);
        project.technologies = find_tech_keywords(&haystack);
    }

    BasicAnalysis {
        tech_keywords: find_tech_keywords(text),
        projects,
        work_experience: work,
    }
}

fn section_header(line: &str) -> Option<Section> {
    if line.chars().count() > 16 {
        return None;
    }
    let lower = line.to_lowercase();
    let lower = lower.trim_end_matches(&[':', '：'][..]);
    if ["项目经验", "项目经历", "项目", "projects", "project experience"].contains(&lower) {
        return Some(Section::Projects);
    }
    if ["工作经历", "工作经验", "实习经历", "work experience", "experience", "employment"].contains(&lower) {
        return Some(Section::Work);
    }
    if [
        "教育背景", "教育经历", "专业技能", "技能", "个人技能", "自我评价", "个人信息", "荣誉奖项",
        "education", "skills", "summary", "awards",
    ]
    .contains(&lower)
    {
        return Some(Section::Other);
    }
    None
}

fn append_description(target: &mut String, line: &str) {
    if target.chars().count() >= MAX_DESCRIPTION_CHARS {
        return;
    }
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line.trim());
}
