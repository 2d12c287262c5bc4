//! Interview orchestration (`/api/interview/*`).
//!
//! generation → evaluation → completion → report. Model answers are filled
//! in by the `best_answers` background task.

pub mod best_answers;
pub mod completion;
pub mod evaluation;
pub mod generation;
pub mod handlers;
pub mod prompts;
pub mod repo;
pub mod report;
pub mod report_html;
