use anyhow::{Context, Result};

const DEFAULT_UPLOAD_MAX_SIZE: usize = 10 * 1024 * 1024;
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Application configuration loaded from environment variables.
/// Built once in `main` and carried inside `AppState`; nothing reads the
/// environment after start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub nextauth_url: Option<String>,
    pub nextauth_secret: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Overrides the chat-completions host for the DeepSeek key.
    pub deepseek_base_url: String,
    pub llm_model: String,
    /// Accepted for parity with the deployment environment; nothing connects to it.
    pub redis_url: Option<String>,
    pub upload_max_size: usize,
    pub interview_duration_dev: u32,
    pub interview_duration_prod: u32,
    pub app_env: String,
    pub port: u16,
    pub rust_log: String,
}

/// Which OpenAI-compatible endpoint the LLM client talks to.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            nextauth_url: optional_env("NEXTAUTH_URL"),
            nextauth_secret: optional_env("NEXTAUTH_SECRET"),
            deepseek_api_key: optional_env("DEEPSEEK_API_KEY"),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            deepseek_base_url: optional_env("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|| DEEPSEEK_BASE_URL.to_string()),
            llm_model: optional_env("DEEPSEEK_MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
            redis_url: optional_env("REDIS_URL"),
            upload_max_size: parse_env("UPLOAD_MAX_SIZE", DEFAULT_UPLOAD_MAX_SIZE)?,
            interview_duration_dev: parse_env("INTERVIEW_DURATION_DEV", 30)?,
            interview_duration_prod: parse_env("INTERVIEW_DURATION_PROD", 60)?,
            app_env: optional_env("APP_ENV").unwrap_or_else(|| "development".to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// Interview length in minutes for the current environment.
    pub fn interview_duration_minutes(&self) -> u32 {
        if self.is_production() {
            self.interview_duration_prod
        } else {
            self.interview_duration_dev
        }
    }

    /// Resolves the chat-completions endpoint. DeepSeek wins when both keys exist.
    /// An Anthropic-only configuration has no compatible endpoint and yields `None`.
    pub fn llm_endpoint(&self) -> Option<LlmEndpoint> {
        if let Some(key) = &self.deepseek_api_key {
            return Some(LlmEndpoint {
                base_url: self.deepseek_base_url.clone(),
                api_key: key.clone(),
                model: self.llm_model.clone(),
            });
        }
        self.openai_api_key.as_ref().map(|key| LlmEndpoint {
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: key.clone(),
            model: "gpt-4o-mini".to_string(),
        })
    }

    /// Names of the variables the health check requires but which are absent.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.database_url.is_empty() {
            missing.push("DATABASE_URL");
        }
        if self.nextauth_url.is_none() {
            missing.push("NEXTAUTH_URL");
        }
        if self.nextauth_secret.is_none() {
            missing.push("NEXTAUTH_SECRET");
        }
        if self.deepseek_api_key.is_none()
            && self.openai_api_key.is_none()
            && self.anthropic_api_key.is_none()
        {
            missing.push("DEEPSEEK_API_KEY|OPENAI_API_KEY|ANTHROPIC_API_KEY");
        }
        missing
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/codemocklab_test".to_string(),
        nextauth_url: Some("http://localhost:3000".to_string()),
        nextauth_secret: Some("secret".to_string()),
        deepseek_api_key: Some("sk-test".to_string()),
        openai_api_key: None,
        anthropic_api_key: None,
        deepseek_base_url: DEEPSEEK_BASE_URL.to_string(),
        llm_model: "deepseek-chat".to_string(),
        redis_url: None,
        upload_max_size: DEFAULT_UPLOAD_MAX_SIZE,
        interview_duration_dev: 30,
        interview_duration_prod: 60,
        app_env: "development".to_string(),
        port: 8080,
        rust_log: "info".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deepseek_key_takes_precedence() {
        let mut config = test_config();
        config.openai_api_key = Some("sk-openai".to_string());
        let endpoint = config.llm_endpoint().unwrap();
        assert_eq!(endpoint.api_key, "sk-test");
        assert_eq!(endpoint.base_url, DEEPSEEK_BASE_URL);
    }

    #[test]
    fn test_openai_key_used_without_deepseek() {
        let mut config = test_config();
        config.deepseek_api_key = None;
        config.openai_api_key = Some("sk-openai".to_string());
        assert_eq!(config.llm_endpoint().unwrap().base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn test_anthropic_only_has_no_endpoint_but_passes_health() {
        let mut config = test_config();
        config.deepseek_api_key = None;
        config.anthropic_api_key = Some("sk-ant".to_string());
        assert!(config.llm_endpoint().is_none());
        assert!(config.missing_required().is_empty());
    }

    #[test]
    fn test_missing_required_lists_absent_vars() {
        let mut config = test_config();
        config.nextauth_secret = None;
        config.deepseek_api_key = None;
        let missing = config.missing_required();
        assert_eq!(missing.len(), 2);
        assert!(missing.contains(&"NEXTAUTH_SECRET"));
    }

    #[test]
    fn test_interview_duration_follows_env() {
        let mut config = test_config();
        assert_eq!(config.interview_duration_minutes(), 30);
        config.app_env = "Production".to_string();
        assert_eq!(config.interview_duration_minutes(), 60);
    }
}
