// Shared prompt constants and prompt-building utilities.
// Each module that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System message sent with every chat completion.
pub const SYSTEM_MESSAGE: &str = "你是一位资深的技术面试官和职业发展顾问，\
    熟悉互联网行业各类技术岗位的招聘标准。你的回答必须专业、客观、具体。";

/// Appended to every prompt whose reply is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "\
重要：请只返回一个合法的JSON对象。\
不要使用markdown代码块，不要在JSON前后添加任何解释文字，\
所有字符串使用双引号，数组和对象末尾不要有多余的逗号。";

/// Renders a labelled prompt section; empty bodies become "（无）".
pub fn section(title: &str, body: &str) -> String {
    let body = body.trim();
    let body = if body.is_empty() { "（无）" } else { body };
    format!("## {title}\n{body}\n\n")
}

/// Renders a bullet list, one item per line.
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
