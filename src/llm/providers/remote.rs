use crate::config::LlmConfig;
use crate::llm::{status_error, LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible chat completions endpoint.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote LLM provider".to_string())
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    // The models listing lives next to the completions endpoint
    fn models_url(&self) -> String {
        match self.api_url.strip_suffix("/chat/completions") {
            Some(base) => format!("{}/models", base),
            None => format!("{}/models", self.api_url.trim_end_matches('/')),
        }
    }
}

fn first_choice(response: PromptResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))
}

#[async_trait]
impl TextGenerator for RemoteLlmProvider {
    async fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, LlmError> {
        let request = PromptRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: 2000,
            stop: stop.to_vec(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Remote", status, &body));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = first_choice(prompt_response)?;
        debug!("Raw response from remote model: {}", content);
        Ok(content)
    }

    async fn verify(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(self.models_url())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Remote", status, &body));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: Option<&str>, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            backend: "remote".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: api_key.map(str::to_string),
            api_url: api_url.map(str::to_string),
            temperature: 0.2,
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_requires_url_and_key() {
        assert!(matches!(
            RemoteLlmProvider::new(&config(None, Some("k"))),
            Err(LlmError::ConfigError(_))
        ));
        assert!(matches!(
            RemoteLlmProvider::new(&config(Some("http://localhost/v1/chat/completions"), None)),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn test_models_url_derived_from_completions_url() {
        let provider =
            RemoteLlmProvider::new(&config(Some("https://api.example.com/v1/chat/completions"), Some("k")))
                .unwrap();
        assert_eq!(provider.models_url(), "https://api.example.com/v1/models");
    }

    #[test]
    fn test_request_omits_empty_stop() {
        let request = PromptRequest {
            model: "m",
            messages: vec![Message { role: "user", content: "hi" }],
            temperature: 0.2,
            max_tokens: 10,
            stop: Vec::new(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("stop").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_first_choice_parsing() {
        let response: PromptResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"SELECT 1"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(response).unwrap(), "SELECT 1");

        let empty: PromptResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice(empty), Err(LlmError::ResponseError(_))));
    }
}
