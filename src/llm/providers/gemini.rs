use crate::config::LlmConfig;
use crate::llm::{status_error, LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent` API.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError(
                "API key is required for the Gemini provider (set TSHIRT_SQL__LLM__API_KEY)".to_string(),
            )
        })?;

        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

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

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_url, self.model)
    }
}

fn candidate_text(response: GenerateResponse) -> Result<String, LlmError> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| LlmError::ResponseError("No candidates in response".to_string()))?;

    Ok(content.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    async fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, LlmError> {
        info!("Sending request to Gemini with model: {}", self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                stop_sequences: stop.to_vec(),
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Gemini", status, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let text = candidate_text(parsed)?;
        debug!("Raw response from Gemini: {}", text);
        Ok(text)
    }

    async fn verify(&self) -> Result<(), LlmError> {
        // Listing models is free and fails fast on a bad key
        let response = self
            .client
            .get(format!("{}/models", self.api_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            // Gemini answers 400 API_KEY_INVALID rather than 401
            return Err(LlmError::ConfigError("Gemini API key rejected".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Gemini", status, &body));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            backend: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: api_key.map(str::to_string),
            api_url: None,
            temperature: 0.2,
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_missing_key_has_no_fallback() {
        assert!(matches!(GeminiProvider::new(&config(None)), Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_generate_url() {
        let provider = GeminiProvider::new(&config(Some("key"))).unwrap();
        assert_eq!(
            provider.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                stop_sequences: vec!["\nSQLResult:"],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["stopSequences"][0], "\nSQLResult:");
    }

    #[test]
    fn test_candidate_parts_are_joined() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"SELECT "},{"text":"1"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(candidate_text(parsed).unwrap(), "SELECT 1");

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(candidate_text(blocked), Err(LlmError::ResponseError(_))));
    }
}
