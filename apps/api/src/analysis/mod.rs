//! Résumé analysis: prompt, LLM reply repair, typed profile, keyword fallback.

pub mod analyzer;
pub mod fallback;
pub mod profile;
pub mod prompts;
pub mod repair;

pub use analyzer::{AnalysisOutcome, AnalysisSource, ResumeAnalyzer};
