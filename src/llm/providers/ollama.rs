use crate::config::LlmConfig;
use crate::llm::{status_error, LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions<'a>,
}

#[derive(Serialize, Debug)]
struct OllamaOptions<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn tags_url(&self) -> String {
        match self.api_url.strip_suffix("/api/generate") {
            Some(base) => format!("{}/api/tags", base),
            None => format!("{}/api/tags", self.api_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: self.temperature,
                stop: stop.to_vec(),
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Ollama API responded with status code: {}", status);
            return Err(status_error("Ollama", status, &body));
        }

        // Get the raw text response first for diagnostics
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response = serde_json::from_str::<OllamaResponse>(&response_text).map_err(|e| {
            error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
            LlmError::ResponseError(format!(
                "Failed to parse Ollama response: {} - Response was: {}",
                e, response_text
            ))
        })?;

        if ollama_response.done == Some(false) {
            debug!("Ollama reported an unfinished generation");
        }

        Ok(ollama_response.response)
    }

    async fn verify(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(self.tags_url())
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Ollama", status, &body));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(api_url: Option<&str>) -> OllamaProvider {
        OllamaProvider::new(&LlmConfig {
            backend: "ollama".to_string(),
            model: "sqlcoder".to_string(),
            api_key: None,
            api_url: api_url.map(str::to_string),
            temperature: 0.1,
            timeout_secs: 10,
        })
        .unwrap()
    }

    #[test]
    fn test_default_url_and_tags_url() {
        let p = provider(None);
        assert_eq!(p.api_url, DEFAULT_API_URL);
        assert_eq!(p.tags_url(), "http://localhost:11434/api/tags");

        let p = provider(Some("http://gpu-box:11434/"));
        assert_eq!(p.tags_url(), "http://gpu-box:11434/api/tags");
    }

    #[test]
    fn test_temperature_and_stop_sent_as_options() {
        let request = OllamaRequest {
            model: "sqlcoder",
            prompt: "p",
            stream: false,
            options: OllamaOptions {
                temperature: 0.1,
                stop: vec!["\nSQLResult:"],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["options"]["stop"][0], "\nSQLResult:");
        assert!(json.get("temperature").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let parsed: OllamaResponse = serde_json::from_str(
            r#"{"model":"sqlcoder","created_at":"2024-01-01T00:00:00Z","response":"SELECT 1","done":true,"eval_count":12}"#,
        )
        .unwrap();
        assert_eq!(parsed.response, "SELECT 1");
        assert_eq!(parsed.done, Some(true));
    }
}
