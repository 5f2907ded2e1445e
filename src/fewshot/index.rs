use crate::embedding::{EmbeddingError, EmbeddingManager};
use crate::fewshot::exemplars::Exemplar;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct ScoredExemplar {
    pub exemplar: Exemplar,
    pub score: f32,
}

/// Exemplars with their embeddings. Built once, read-only afterwards.
pub struct ExampleIndex {
    entries: Vec<(Exemplar, Vec<f32>)>,
}

impl ExampleIndex {
    pub async fn build(
        exemplars: Vec<Exemplar>,
        embedder: &EmbeddingManager,
    ) -> Result<Self, EmbeddingError> {
        let texts: Vec<String> = exemplars.iter().map(Exemplar::embedding_text).collect();
        let vectors = embedder.embed(&texts).await?;

        info!(
            "Indexed {} exemplars with the {} embedder",
            exemplars.len(),
            embedder.backend_name()
        );

        Ok(Self {
            entries: exemplars.into_iter().zip(vectors).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn exemplars(&self) -> impl Iterator<Item = &Exemplar> {
        self.entries.iter().map(|(e, _)| e)
    }

    /// Top `k` exemplars by cosine similarity to `question`, best first.
    pub async fn select(
        &self,
        question: &str,
        k: usize,
        embedder: &EmbeddingManager,
    ) -> Result<Vec<ScoredExemplar>, EmbeddingError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query = embedder.embed_one(question).await?;
        if let Some((_, first)) = self.entries.first() {
            if first.len() != query.len() {
                return Err(EmbeddingError::ResponseError(format!(
                    "question embedding has {} dimensions, index has {}",
                    query.len(),
                    first.len()
                )));
            }
        }

        Ok(self.rank(&query, k))
    }

    fn rank(&self, query: &[f32], k: usize) -> Vec<ScoredExemplar> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i, cosine_similarity(query, v).unwrap_or(0.0)))
            .collect();

        // Stable sort keeps the original position on ties
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        debug!("Selected exemplars (index, score): {:?}", scored);

        scored
            .into_iter()
            .map(|(i, score)| ScoredExemplar {
                exemplar: self.entries[i].0.clone(),
                score,
            })
            .collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some((dot / denom) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::providers::hashing::HashingEmbedder;
    use crate::fewshot::exemplars::default_exemplars;

    fn embedder() -> EmbeddingManager {
        EmbeddingManager::from_embedder(Box::new(HashingEmbedder::new(384).unwrap()))
    }

    #[tokio::test]
    async fn test_selection_is_deterministic_and_sorted() {
        let embedder = embedder();
        let index = ExampleIndex::build(default_exemplars(), &embedder).await.unwrap();
        let question = "How many white Nike t-shirts in XS do we have?";

        let first = index.select(question, 2, &embedder).await.unwrap();
        let second = index.select(question, 2, &embedder).await.unwrap();

        assert_eq!(first.len(), 2);
        assert!(first[0].score >= first[1].score);
        let questions = |v: &[ScoredExemplar]| {
            v.iter().map(|s| s.exemplar.question.clone()).collect::<Vec<_>>()
        };
        assert_eq!(questions(&first), questions(&second));
        assert_eq!(
            first[0].exemplar.question,
            "How many t-shirts do we have left for Nike in XS size and white color?"
        );
    }

    #[tokio::test]
    async fn test_k_bounds() {
        let embedder = embedder();
        let index = ExampleIndex::build(default_exemplars(), &embedder).await.unwrap();

        assert!(index.select("anything", 0, &embedder).await.unwrap().is_empty());

        let all = index.select("Levi revenue", 50, &embedder).await.unwrap();
        assert_eq!(all.len(), index.len());
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_original_order() {
        let exemplar = |q: &str| Exemplar {
            question: q.to_string(),
            sql: String::new(),
            result_template: String::new(),
            answer_template: String::new(),
        };
        let index = ExampleIndex {
            entries: vec![
                (exemplar("a"), vec![1.0, 0.0]),
                (exemplar("b"), vec![0.0, 1.0]),
                (exemplar("c"), vec![1.0, 0.0]),
                (exemplar("d"), vec![0.0, 0.0]),
            ],
        };

        let ranked = index.rank(&[1.0, 0.0], 4);
        let order: Vec<_> = ranked.iter().map(|s| s.exemplar.question.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b", "d"]);
        assert_eq!(ranked[3].score, 0.0);
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        let s = cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]).unwrap();
        assert!((s - 1.0).abs() < 1e-6);
    }
}
