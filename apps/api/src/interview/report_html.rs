//! Downloadable HTML reports. Self-contained documents with inline CSS; every
//! user- or model-supplied string goes through `html_escape`.

use crate::models::interview::{InterviewRow, ModelAnswer, QuestionRow, ReportRow};

const STYLE: &str = r#"<style>
body { font-family: -apple-system, "PingFang SC", "Microsoft YaHei", sans-serif; color: #1f2937; max-width: 880px; margin: 0 auto; padding: 32px; }
h1 { font-size: 24px; margin-bottom: 4px; }
h2 { font-size: 18px; border-bottom: 2px solid #e5e7eb; padding-bottom: 6px; margin-top: 32px; }
.meta { color: #6b7280; font-size: 13px; }
.scores { display: flex; gap: 12px; margin: 20px 0; }
.score-card { flex: 1; border: 1px solid #e5e7eb; border-radius: 8px; padding: 12px; text-align: center; }
.score-value { font-size: 28px; font-weight: 700; }
.score-label { font-size: 12px; color: #6b7280; }
.good { color: #059669; } .fair { color: #d97706; } .poor { color: #dc2626; }
.question { border: 1px solid #e5e7eb; border-radius: 8px; padding: 12px 16px; margin: 12px 0; }
.answer { background: #f9fafb; border-radius: 6px; padding: 8px 12px; white-space: pre-wrap; }
.page-break { page-break-after: always; }
</style>"#;

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn score_class(score: f64) -> &'static str {
    if score >= 80.0 {
        "good"
    } else if score >= 60.0 {
        "fair"
    } else {
        "poor"
    }
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"zh-CN\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{STYLE}\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        html_escape(title)
    )
}

fn render_list(title: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let lis: String = items
        .iter()
        .map(|i| format!("<li>{}</li>", html_escape(i)))
        .collect();
    format!("<h2>{}</h2>\n<ul>{lis}</ul>\n", html_escape(title))
}

fn render_scores(report: &ReportRow) -> String {
    let cards = [
        ("综合得分", report.overall_score),
        ("技术能力", report.technical_score),
        ("沟通表达", report.communication_score),
        ("系统设计", report.system_design_score),
    ]
    .iter()
    .map(|(label, score)| {
        format!(
            r#"<div class="score-card"><div class="score-value {}">{:.0}</div><div class="score-label">{}</div></div>"#,
            score_class(*score),
            score,
            label
        )
    })
    .collect::<Vec<_>>()
    .join("");
    format!("<div class=\"scores\">{cards}</div>\n")
}

fn render_question(q: &QuestionRow) -> String {
    let score = match q.score {
        Some(s) => format!(r#"<span class="{}">{s:.0} 分</span>"#, score_class(s)),
        None => "未作答".to_string(),
    };
    let mut html = format!(
        "<div class=\"question\">\n<p><strong>{}. {}</strong> <span class=\"meta\">{} · {}</span> {score}</p>\n",
        q.position,
        html_escape(&q.content),
        html_escape(&q.question_type),
        html_escape(&q.difficulty),
    );
    if let Some(answer) = &q.user_answer {
        html.push_str(&format!(
            "<p class=\"meta\">我的回答</p><div class=\"answer\">{}</div>\n",
            html_escape(answer)
        ));
    }
    if let Some(feedback) = q.feedback.as_deref().filter(|f| !f.is_empty()) {
        html.push_str(&format!("<p>点评：{}</p>\n", html_escape(feedback)));
    }
    if let ModelAnswer::Ready(model) = q.model_answer_state() {
        html.push_str(&format!(
            "<p class=\"meta\">参考答案</p><div class=\"answer\">{}</div>\n",
            html_escape(&model)
        ));
    }
    html.push_str("</div>\n");
    html
}

fn render_report_body(position: &str, interview: &InterviewRow, report: &ReportRow, questions: &[QuestionRow]) -> String {
    let mut body = format!(
        "<h1>模拟面试报告 · {}</h1>\n<p class=\"meta\">面试类型：{} ｜ 完成时间：{}</p>\n",
        html_escape(position),
        html_escape(&interview.interview_type),
        interview
            .completed_at
            .unwrap_or(report.created_at)
            .format("%Y-%m-%d %H:%M")
    );
    body.push_str(&render_scores(report));
    if let Some(summary) = report.detailed_analysis.get("summary").and_then(|v| v.as_str()) {
        body.push_str(&format!("<p>{}</p>\n", html_escape(summary)));
    }
    body.push_str(&render_list("优势", &report.strengths));
    body.push_str(&render_list("不足", &report.weaknesses));
    body.push_str(&render_list("改进建议", &report.recommendations));
    if !questions.is_empty() {
        body.push_str("<h2>答题详情</h2>\n");
        for q in questions {
            body.push_str(&render_question(q));
        }
    }
    body
}

/// One interview report with its questions.
pub fn render_report(position: &str, interview: &InterviewRow, report: &ReportRow, questions: &[QuestionRow]) -> String {
    document(
        &format!("模拟面试报告 - {position}"),
        &render_report_body(position, interview, report, questions),
    )
}

/// Every report of a user in one document, summary table first.
pub fn render_all_reports(entries: &[(InterviewRow, ReportRow)]) -> String {
    let mut body = String::from("<h1>全部模拟面试报告</h1>\n");
    if entries.is_empty() {
        body.push_str("<p class=\"meta\">暂无已完成的面试报告</p>\n");
        return document("全部模拟面试报告", &body);
    }

    let average = entries.iter().map(|(_, r)| r.overall_score).sum::<f64>() / entries.len() as f64;
    body.push_str(&format!(
        "<p class=\"meta\">共 {} 场面试，平均综合得分 {:.1}</p>\n",
        entries.len(),
        average
    ));
    body.push_str("<table style=\"width:100%; border-collapse: collapse;\">\n<tr><th align=\"left\">日期</th><th align=\"left\">类型</th><th>综合</th><th>技术</th><th>沟通</th><th>系统设计</th></tr>\n");
    for (interview, report) in entries {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td align=\"center\" class=\"{}\">{:.0}</td><td align=\"center\">{:.0}</td><td align=\"center\">{:.0}</td><td align=\"center\">{:.0}</td></tr>\n",
            report.created_at.format("%Y-%m-%d"),
            html_escape(&interview.interview_type),
            score_class(report.overall_score),
            report.overall_score,
            report.technical_score,
            report.communication_score,
            report.system_design_score,
        ));
    }
    body.push_str("</table>\n");

    for (interview, report) in entries {
        body.push_str("<div class=\"page-break\"></div>\n");
        body.push_str(&render_scores(report));
        body.push_str(&format!(
            "<p class=\"meta\">{} · {}</p>\n",
            html_escape(&interview.interview_type),
            report.created_at.format("%Y-%m-%d %H:%M")
        ));
        body.push_str(&render_list("优势", &report.strengths));
        body.push_str(&render_list("不足", &report.weaknesses));
        body.push_str(&render_list("改进建议", &report.recommendations));
    }
    document("全部模拟面试报告", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interview::{question, QuestionType, MODEL_ANSWER_FAILED};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn interview() -> InterviewRow {
        InterviewRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            job_position_id: None,
            interview_type: "technical".into(),
            status: "completed".into(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    fn report(interview_id: Uuid, overall: f64) -> ReportRow {
        ReportRow {
            id: Uuid::new_v4(),
            interview_id,
            overall_score: overall,
            technical_score: overall,
            communication_score: overall,
            system_design_score: overall,
            strengths: vec!["<b>基础扎实</b>".into()],
            weaknesses: vec![],
            recommendations: vec!["多练习".into()],
            detailed_analysis: json!({"summary": "A & B"}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_single_report_escapes_content() {
        let i = interview();
        let r = report(i.id, 85.0);
        let mut q = question(1, QuestionType::Coding);
        q.user_answer = Some("fn main() { println!(\"<hi>\"); }".into());
        q.score = Some(55.0);
        let mut failed = question(2, QuestionType::Coding);
        failed.model_answer = Some(MODEL_ANSWER_FAILED.into());

        let html = render_report("后端", &i, &r, &[q, failed]);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("&lt;b&gt;基础扎实&lt;/b&gt;"));
        assert!(html.contains("A &amp; B"));
        assert!(html.contains("&lt;hi&gt;"));
        assert!(html.contains("class=\"poor\">55 分"));
        assert!(!html.contains(MODEL_ANSWER_FAILED));
        assert!(!html.contains("<h2>不足</h2>"));
    }

    #[test]
    fn test_all_reports_lists_every_interview() {
        let a = interview();
        let b = interview();
        let entries = vec![(a.clone(), report(a.id, 90.0)), (b.clone(), report(b.id, 50.0))];
        let html = render_all_reports(&entries);
        assert!(html.contains("共 2 场面试，平均综合得分 70.0"));
        assert_eq!(html.matches("page-break\"></div>").count(), 2);
        assert!(render_all_reports(&[]).contains("暂无已完成的面试报告"));
    }
}
