pub mod providers;

use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding connection error: {0}")]
    ConnectionError(String),
    #[error("embedding response error: {0}")]
    ResponseError(String),
    #[error("embedding configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn name(&self) -> &str;
}

pub struct EmbeddingManager {
    embedder: Box<dyn Embedder + Send + Sync>,
}

impl EmbeddingManager {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let embedder: Box<dyn Embedder + Send + Sync> = match config.backend.as_str() {
            "fastembed" => Box::new(providers::local::LocalEmbedder::new(config)?),
            "hashing" => Box::new(providers::hashing::HashingEmbedder::new(config.dimensions)?),
            "ollama" => Box::new(providers::ollama::OllamaEmbedder::new(config)?),
            "remote" => Box::new(providers::remote::RemoteEmbedder::new(config)?),
            _ => {
                return Err(EmbeddingError::ConfigError(format!(
                    "Unsupported embedding backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { embedder })
    }

    pub fn from_embedder(embedder: Box<dyn Embedder + Send + Sync>) -> Self {
        Self { embedder }
    }

    /// Embeds `texts`, checking that the backend returned one vector per text
    /// and that every vector has the same length.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let vectors = self.embedder.embed(texts).await?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::ResponseError(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        if let Some(first) = vectors.first() {
            let dims = first.len();
            if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
                return Err(EmbeddingError::ResponseError(
                    "embedding vectors have inconsistent dimensions".to_string(),
                ));
            }
        }

        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::ResponseError("empty embedding response".to_string()))
    }

    pub fn backend_name(&self) -> &str {
        self.embedder.name()
    }
}
