use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::analysis::fallback;
use crate::analysis::profile::AiProfile;
use crate::analysis::prompts::build_resume_analysis_prompt;
use crate::analysis::repair::{normalize_analysis, parse_llm_json};
use crate::document::BasicAnalysis;
use crate::llm_client::{CompletionRequest, LlmBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Llm,
    Fallback,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisSource::Llm => "llm",
            AnalysisSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub profile: AiProfile,
    pub source: AnalysisSource,
    /// Audit snapshot stored as `ai_profiles.raw_analysis`.
    pub raw: Value,
}

/// Runs the LLM analysis and degrades to the keyword analyzer on any failure.
pub struct ResumeAnalyzer<'a> {
    llm: &'a dyn LlmBackend,
}

impl<'a> ResumeAnalyzer<'a> {
    pub fn new(llm: &'a dyn LlmBackend) -> Self {
        Self { llm }
    }

    /// Never fails: an upstream error, unrepairable JSON or a missing `techStack`
    /// all produce the fallback profile.
    pub async fn analyze(&self, filtered_text: &str, basic: &BasicAnalysis) -> AnalysisOutcome {
        let prompt = build_resume_analysis_prompt(filtered_text, basic);
        let reason = match self.llm.complete(CompletionRequest::resume_analysis(prompt)).await {
            Ok(reply) => match parse_llm_json(&reply).and_then(normalize_analysis) {
                Some(normalized) => {
                    let profile = AiProfile::from_value(&normalized);
                    info!(
                        "LLM résumé analysis: level={}, {} technologies, bank={}",
                        profile.experience_level.as_str(),
                        profile.tech_stack.len(),
                        profile.simulated_interview.is_some()
                    );
                    return AnalysisOutcome {
                        profile,
                        source: AnalysisSource::Llm,
                        raw: normalized,
                    };
                }
                None => "reply was not a usable analysis object".to_string(),
            },
            Err(e) => e.to_string(),
        };

        warn!("Falling back to keyword analysis: {reason}");
        Self::fallback(filtered_text, &reason)
    }

    pub fn fallback(filtered_text: &str, reason: &str) -> AnalysisOutcome {
        let profile = fallback::analyze(filtered_text);
        let raw = json!({
            "source": AnalysisSource::Fallback.as_str(),
            "reason": reason,
            "profile": serde_json::to_value(&profile).unwrap_or(Value::Null),
        });
        AnalysisOutcome {
            profile,
            source: AnalysisSource::Fallback,
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::profile::{ExperienceLevel, TechCategory};
    use crate::llm_client::testing::ScriptedLlm;

    const REPLY: &str = r#"```json
{"experienceLevel":"senior","experienceLevelConfidence":0.9,
 "techStack":[{"technology":"Redis","category":"database","dominanceScore":60},
              {"technology":"Go","category":"language","dominanceScore":95}],
 "roleMatchingAnalysis":[{"role":"后端工程师","matchScore":90}],
 "simulatedInterview":{"techDepth":{"Go":["channel 的实现原理？"]}}}
```"#;

    #[tokio::test]
    async fn test_llm_reply_becomes_profile() {
        let llm = ScriptedLlm::new().reply(REPLY);
        let outcome = ResumeAnalyzer::new(&llm)
            .analyze("Go 开发", &BasicAnalysis::default())
            .await;
        assert_eq!(outcome.source, AnalysisSource::Llm);
        assert_eq!(outcome.profile.experience_level, ExperienceLevel::Senior);
        assert_eq!(outcome.profile.tech_stack[0].technology, "Go");
        assert_eq!(outcome.profile.role_matching_analysis["后端工程师"], 90.0);
        assert!(outcome.profile.simulated_interview.is_some());
        assert_eq!(llm.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_uses_fallback() {
        let llm = ScriptedLlm::new().fail(500);
        let outcome = ResumeAnalyzer::new(&llm)
            .analyze("5年经验，熟悉 React", &BasicAnalysis::default())
            .await;
        assert_eq!(outcome.source, AnalysisSource::Fallback);
        assert_eq!(outcome.profile.experience_level, ExperienceLevel::Mid);
        assert_eq!(outcome.profile.tech_stack[0].category, TechCategory::Framework);
        assert!(outcome.profile.simulated_interview.is_none());
        assert_eq!(outcome.raw["source"], "fallback");
    }

    #[tokio::test]
    async fn test_reply_without_tech_stack_uses_fallback() {
        let llm = ScriptedLlm::new().reply(r#"{"experienceLevel":"lead"}"#);
        let outcome = ResumeAnalyzer::new(&llm).analyze("", &BasicAnalysis::default()).await;
        assert_eq!(outcome.source, AnalysisSource::Fallback);
        assert_eq!(outcome.profile.experience_level, ExperienceLevel::Junior);
    }
}
