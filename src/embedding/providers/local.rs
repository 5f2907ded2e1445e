//! On-device sentence embeddings with fastembed (ONNX runtime).
//!
//! The model is loaded on the first `embed` call, on a blocking thread, since
//! loading may download the model files into fastembed's cache.

use crate::config::EmbeddingConfig;
use crate::embedding::{Embedder, EmbeddingError};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct LocalEmbedder {
    model: EmbeddingModel,
    engine: Arc<Mutex<Option<TextEmbedding>>>,
}

/// Maps a configured model name to a fastembed model.
pub fn model_for(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    let normalized = name.to_ascii_lowercase();
    let short = normalized
        .strip_prefix("sentence-transformers/")
        .or_else(|| normalized.strip_prefix("baai/"))
        .unwrap_or(&normalized);

    match short {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        _ => Err(EmbeddingError::ConfigError(format!(
            "Unsupported fastembed model: {}",
            name
        ))),
    }
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Ok(Self {
            model: model_for(&config.model)?,
            engine: Arc::new(Mutex::new(None)),
        })
    }
}

fn load(model: EmbeddingModel) -> Result<TextEmbedding, EmbeddingError> {
    info!("Loading fastembed model {:?}", model);
    TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
        .map_err(|e| EmbeddingError::ConfigError(format!("failed to load embedding model: {}", e)))
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        debug!("Embedding {} texts locally", texts.len());

        let engine = Arc::clone(&self.engine);
        let model = self.model.clone();
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if guard.is_none() {
                *guard = Some(load(model)?);
            }
            let Some(engine) = guard.as_mut() else {
                return Err(EmbeddingError::ConfigError("embedding model not loaded".to_string()));
            };

            engine
                .embed(texts, None)
                .map_err(|e| EmbeddingError::ResponseError(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::ConnectionError(format!("embedding task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "fastembed"
    }
}
