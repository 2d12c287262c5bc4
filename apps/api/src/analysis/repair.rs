//! Response Repair & Parser.
//!
//! LLM replies are untrusted free text that is usually, but not always, a JSON
//! object. `parse_llm_json` recovers an object through a fixed sequence of
//! cleaning steps and returns `None` when nothing parses; callers treat `None`
//! as "fallback required", never as a request failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::analysis::profile::number;
use crate::llm_client::excerpt;

/// Upper bound on comma back-off attempts for a truncated reply.
const MAX_BACKOFF_ATTEMPTS: usize = 64;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json|JSON)?").unwrap());
static GREEDY_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Recovers a JSON object from a raw LLM reply.
///
/// 1. strip code fences anywhere in the text
/// 2. parse directly when the text is already `{...}`
/// 3. otherwise take the greedy `{...}` span
/// 4. repair a truncated tail (trim to the last boundary, close open scopes,
///    back off to earlier commas)
/// 5. give up with `None`
pub fn parse_llm_json(raw: &str) -> Option<Value> {
    let cleaned = CODE_FENCE.replace_all(raw, "");
    let text = cleaned.trim();

    if text.starts_with('{') && text.ends_with('}') {
        if let Some(value) = parse_object(text) {
            return Some(value);
        }
    }

    if let Some(m) = GREEDY_OBJECT.find(text) {
        if let Some(value) = parse_object(m.as_str()) {
            return Some(value);
        }
    }

    let start = text.find('{')?;
    let repaired = repair_truncated(&text[start..]);
    if repaired.is_none() {
        warn!("LLM reply could not be repaired into JSON: {}", excerpt(raw));
    }
    repaired
}

/// Parses `text` as an object, retrying once with trailing commas removed.
fn parse_object(text: &str) -> Option<Value> {
    let attempt = |candidate: &str| match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    };
    attempt(text).or_else(|| {
        let without_commas = TRAILING_COMMA.replace_all(text, "$1");
        attempt(&without_commas)
    })
}

fn repair_truncated(candidate: &str) -> Option<Value> {
    let trimmed = candidate.trim_end();

    // Trim to the last `,` or `}` boundary; without one, cut before the last quote.
    let base: &str = if trimmed.ends_with(',') || trimmed.ends_with('}') {
        trimmed.strip_suffix(',').unwrap_or(trimmed)
    } else {
        match trimmed.rfind('"') {
            Some(idx) if idx > 0 => &trimmed[..idx],
            _ => trimmed,
        }
    };

    if let Some(value) = parse_object(&close_open_scopes(base)) {
        debug!("Repaired truncated LLM reply at its tail");
        return Some(value);
    }

    // Back off to earlier commas outside strings until something parses.
    for cut in comma_positions(base).into_iter().rev().take(MAX_BACKOFF_ATTEMPTS) {
        if let Some(value) = parse_object(&close_open_scopes(&base[..cut])) {
            debug!("Repaired truncated LLM reply by backing off to byte {cut}");
            return Some(value);
        }
    }
    None
}

/// Appends the quote, brackets and braces needed to close every scope left open.
fn close_open_scopes(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    let keep = out.trim_end().trim_end_matches(',').len();
    out.truncate(keep);
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

/// Byte offsets of commas that sit outside string literals.
fn comma_positions(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            positions.push(idx);
        }
    }
    positions
}

/// Sanity check and post-processing for a résumé analysis object.
///
/// Returns `None` when `techStack` is not an array. Sorts `techStack` by
/// `dominanceScore` (falling back to `valueScore`), strongest first, and turns a
/// `roleMatchingAnalysis` list of `{role, matchScore}` into a map.
pub fn normalize_analysis(mut value: Value) -> Option<Value> {
    let stack = value.get_mut("techStack")?.as_array_mut()?;
    stack.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));

    if let Some(Value::Array(entries)) = value.get("roleMatchingAnalysis") {
        let map: Map<String, Value> = entries
            .iter()
            .filter_map(|entry| {
                let role = entry.get("role").and_then(Value::as_str)?;
                let score = entry.get("matchScore").cloned().unwrap_or(Value::Null);
                Some((role.to_string(), score))
            })
            .collect();
        value["roleMatchingAnalysis"] = Value::Object(map);
    }

    Some(value)
}

fn score_of(item: &Value) -> f64 {
    item.get("dominanceScore")
        .or_else(|| item.get("valueScore"))
        .and_then(number)
        .unwrap_or(f64::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_json_matches_plain_parse() {
        let body = r#"{"name":"张三","skills":["Rust","Go"],"nested":{"x":1.5}}"#;
        let fenced = format!("```json\n{body}\n```");
        let expected: Value = serde_json::from_str(body).unwrap();
        assert_eq!(parse_llm_json(&fenced), Some(expected));
    }

    #[test]
    fn test_surrounding_prose_is_ignored() {
        let raw = "好的，以下是分析结果：\n{\"score\": 85, \"feedback\": \"不错\"}\n希望对你有帮助";
        let value = parse_llm_json(raw).unwrap();
        assert_eq!(value["score"], 85);
    }

    #[test]
    fn test_truncated_array_keeps_earlier_keys() {
        let value = parse_llm_json(r#"{"a":1,"b":[1,2,"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_truncated_mid_string_backs_off_to_complete_item() {
        let raw = r#"{"techStack":[{"technology":"React","dominanceScore":90},{"technology":"Vu"#;
        let value = parse_llm_json(raw).unwrap();
        let stack = value["techStack"].as_array().unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0]["technology"], "React");
    }

    #[test]
    fn test_truncated_after_key_recovers_previous_fields() {
        let value = parse_llm_json(r#"{"experienceLevel":"mid","specializations":["后端"],"tech"#).unwrap();
        assert_eq!(value["experienceLevel"], "mid");
        assert_eq!(value["specializations"][0], "后端");
    }

    #[test]
    fn test_trailing_commas_are_tolerated() {
        let value = parse_llm_json(r#"{"a":[1,2,],"b":{"c":3,},}"#).unwrap();
        assert_eq!(value["a"], json!([1, 2]));
        assert_eq!(value["b"]["c"], 3);
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let raw = r#"{"feedback":"他说\"很好\"","more":"截断"#;
        let value = parse_llm_json(raw).unwrap();
        assert_eq!(value["feedback"], "他说\"很好\"");
    }

    #[test]
    fn test_garbage_returns_none() {
        assert_eq!(parse_llm_json("抱歉，我无法完成这个请求"), None);
        assert_eq!(parse_llm_json(""), None);
        assert_eq!(parse_llm_json("[1,2,3]"), None);
    }

    #[test]
    fn test_normalize_requires_tech_stack_array() {
        assert!(normalize_analysis(json!({"experienceLevel":"mid"})).is_none());
        assert!(normalize_analysis(json!({"techStack":"React"})).is_none());
    }

    #[test]
    fn test_normalize_sorts_by_dominance_score() {
        let value = normalize_analysis(json!({
            "techStack": [
                {"technology": "Git", "dominanceScore": 40},
                {"technology": "Rust", "dominanceScore": 95},
                {"technology": "SQL", "dominanceScore": "70"},
                {"technology": "Go", "dominanceScore": 95}
            ]
        }))
        .unwrap();
        let scores: Vec<f64> = value["techStack"]
            .as_array()
            .unwrap()
            .iter()
            .map(score_of)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(value["techStack"][0]["technology"], "Rust");
    }

    #[test]
    fn test_normalize_survives_non_numeric_scores_in_long_stack() {
        let stack: Vec<Value> = (0..40)
            .map(|i| {
                let score = if i % 3 == 0 { json!("NaN") } else { json!(i) };
                json!({"technology": format!("tech-{i}"), "dominanceScore": score})
            })
            .collect();
        let value = normalize_analysis(json!({ "techStack": stack })).unwrap();
        let sorted = value["techStack"].as_array().unwrap();
        assert_eq!(sorted.len(), 40);
        assert_eq!(sorted[0]["technology"], "tech-38");
        let scores: Vec<f64> = sorted.iter().map(score_of).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_normalize_converts_role_matching_list() {
        let value = normalize_analysis(json!({
            "techStack": [],
            "roleMatchingAnalysis": [
                {"role": "前端工程师", "matchScore": 90},
                {"role": "全栈工程师", "matchScore": 75},
                {"matchScore": 10}
            ]
        }))
        .unwrap();
        assert_eq!(
            value["roleMatchingAnalysis"],
            json!({"前端工程师": 90, "全栈工程师": 75})
        );
    }
}
