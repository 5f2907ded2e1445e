use crate::config::EmbeddingConfig;
use crate::embedding::{Embedder, EmbeddingError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible `/v1/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            EmbeddingError::ConfigError("API URL is required for remote embeddings".to_string())
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            EmbeddingError::ConfigError("API key is required for remote embeddings".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
        })
    }
}

// The API does not promise response order, only an index per item
fn into_ordered(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ResponseError(format!(
                "embeddings API responded with status code: {}",
                response.status()
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ResponseError(e.to_string()))?;

        Ok(into_ordered(parsed.data))
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_reordered_by_index() {
        let parsed: EmbeddingsResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":1,"embedding":[0.0,1.0]},{"object":"embedding","index":0,"embedding":[1.0,0.0]}]}"#,
        )
        .unwrap();
        assert_eq!(into_ordered(parsed.data), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_requires_credentials() {
        let config = EmbeddingConfig {
            backend: "remote".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            api_url: Some("https://api.example.com/v1/embeddings".to_string()),
            dimensions: 0,
            timeout_secs: 5,
        };
        assert!(matches!(RemoteEmbedder::new(&config), Err(EmbeddingError::ConfigError(_))));
    }
}
