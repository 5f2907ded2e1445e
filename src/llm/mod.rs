pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A hosted or local text-completion model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Completes `prompt`. Output is cut at the first of `stop`.
    async fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, LlmError>;

    /// One-shot connectivity and credential check.
    async fn verify(&self) -> Result<(), LlmError>;

    fn name(&self) -> &str;
}

pub struct LlmManager {
    generator: Box<dyn TextGenerator + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn TextGenerator + Send + Sync> = match config.backend.as_str() {
            "gemini" => Box::new(providers::gemini::GeminiProvider::new(config)?),
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { generator })
    }

    pub fn from_generator(generator: Box<dyn TextGenerator + Send + Sync>) -> Self {
        Self { generator }
    }

    pub async fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, LlmError> {
        let text = self.generator.generate(prompt, stop).await?;
        Ok(truncate_at_stop(&text, stop).to_string())
    }

    pub async fn verify(&self) -> Result<(), LlmError> {
        self.generator.verify().await
    }

    pub fn backend_name(&self) -> &str {
        self.generator.name()
    }
}

/// Cuts `text` at the earliest occurrence of any stop sequence.
///
/// Providers are sent the stop sequences too, but not all of them honour them.
pub fn truncate_at_stop<'a>(text: &'a str, stop: &[&str]) -> &'a str {
    stop.iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s))
        .min()
        .map(|idx| &text[..idx])
        .unwrap_or(text)
}

/// Maps a non-success HTTP status to an `LlmError`. 401/403 mean the key was refused.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> LlmError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return LlmError::ConfigError(format!("{} API key rejected ({})", provider, status));
    }

    let body = if body.is_empty() {
        String::new()
    } else {
        format!(" - Response body: {}", body)
    };
    LlmError::ResponseError(format!(
        "{} API responded with status code: {}{}",
        provider, status, body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_at_earliest_stop() {
        let text = "SELECT 1\nSQLResult: [(1,)]\nAnswer: one";
        assert_eq!(truncate_at_stop(text, &["\nAnswer:", "\nSQLResult:"]), "SELECT 1");
        assert_eq!(truncate_at_stop(text, &[]), text);
        assert_eq!(truncate_at_stop(text, &[""]), text);
        assert_eq!(truncate_at_stop("no stops here", &["\nSQLResult:"]), "no stops here");
    }

    #[test]
    fn test_status_error_classification() {
        let err = status_error("Gemini", reqwest::StatusCode::FORBIDDEN, "");
        assert!(matches!(err, LlmError::ConfigError(_)));

        let err = status_error("Ollama", reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        match err {
            LlmError::ResponseError(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let config = LlmConfig {
            backend: "carrier-pigeon".to_string(),
            model: "m".to_string(),
            api_key: None,
            api_url: None,
            temperature: 0.2,
            timeout_secs: 5,
        };
        assert!(matches!(LlmManager::new(&config), Err(LlmError::ConfigError(_))));
    }
}
