/// The single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the LLM provider directly.
/// All LLM interactions go through `LlmBackend`, so handlers and background
/// jobs can be exercised against a scripted backend in tests.
///
/// The client never retries. Callers decide what a failure means: résumé
/// analysis falls back to the keyword analyzer, evaluation surfaces a 503.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LlmEndpoint;

pub mod prompts;

/// Timeout for interactive calls (question generation, evaluation, reports).
pub const STANDARD_TIMEOUT: Duration = Duration::from_secs(30);
/// Résumé analysis produces the largest replies; the upload flow tolerates up to 240s.
pub const RESUME_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(240);

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("LLM call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("No OpenAI-compatible LLM key configured")]
    NotConfigured,

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// A single prompt sent as the user message of a chat completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl CompletionRequest {
    pub fn standard(prompt: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt,
            temperature,
            max_tokens,
            timeout: STANDARD_TIMEOUT,
        }
    }

    pub fn resume_analysis(prompt: String) -> Self {
        Self {
            prompt,
            temperature: 0.3,
            max_tokens: 8000,
            timeout: RESUME_ANALYSIS_TIMEOUT,
        }
    }
}

/// The seam every LLM consumer depends on. Carried in `AppState` as
/// `Arc<dyn LlmBackend>`.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Returns the raw text of the first choice. No format is guaranteed.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// HTTP client for DeepSeek (or any OpenAI-compatible chat-completions endpoint).
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: Option<LlmEndpoint>,
}

impl LlmClient {
    pub fn new(endpoint: Option<LlmEndpoint>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    pub fn model(&self) -> &str {
        self.endpoint
            .as_ref()
            .map(|e| e.model.as_str())
            .unwrap_or("unconfigured")
    }

    fn completions_url(base_url: &str) -> String {
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let endpoint = self.endpoint.as_ref().ok_or(LlmError::NotConfigured)?;

        let body = ChatRequest {
            model: &endpoint.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        debug!(
            "LLM prompt ({} chars): {}",
            request.prompt.chars().count(),
            excerpt(&request.prompt)
        );

        let started = Instant::now();
        let response = self
            .client
            .post(Self::completions_url(&endpoint.base_url))
            .bearer_auth(&endpoint.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, excerpt(&body));
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, request.timeout))?;

        if let Some(usage) = &parsed.usage {
            info!(
                "LLM call succeeded in {}ms: prompt_tokens={}, completion_tokens={}",
                started.elapsed().as_millis(),
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        debug!("LLM reply ({} chars): {}", text.chars().count(), excerpt(&text));
        Ok(text)
    }
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout {
            seconds: timeout.as_secs(),
        }
    } else {
        LlmError::Http(e)
    }
}

/// First `EXCERPT_CHARS` characters, for log lines.
pub fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push('…');
    }
    out
}
