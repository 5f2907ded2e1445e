//! The question answering pipeline.
//!
//! One question goes through exemplar selection, prompt assembly, SQL
//! generation, execution and answer phrasing, strictly in that order. Any
//! stage error aborts the request and is returned unchanged to the caller.

pub mod parse;

use crate::config::{AppConfig, ChainConfig};
use crate::db::{Database, DbError, QueryRows};
use crate::embedding::{EmbeddingError, EmbeddingManager};
use crate::fewshot::exemplars::{default_exemplars, load_exemplars, Exemplar, ExemplarError};
use crate::fewshot::index::ExampleIndex;
use crate::fewshot::prompt::{PromptAssembler, ANSWER_STOP, SQL_STOP};
use crate::llm::{LlmError, LlmManager};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("model did not return a SQL query: {0}")]
    NoSql(String),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Exemplars(#[from] ExemplarError),
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<QueryRows>,
}

/// Database, model client and exemplar index, built once and shared read-only.
pub struct SqlChain {
    db: Database,
    llm: LlmManager,
    embedder: EmbeddingManager,
    index: ExampleIndex,
    assembler: PromptAssembler,
    settings: ChainConfig,
}

impl SqlChain {
    pub async fn build(config: &AppConfig) -> Result<Self, ChainError> {
        let db = Database::connect(&config.database)?;
        db.ping().await?;
        info!("1. Database connection ready: {}", config.database.connection_string);

        let llm = LlmManager::new(&config.llm)?;
        info!("2. LLM initialized: {} ({})", llm.backend_name(), config.llm.model);

        let embedder = EmbeddingManager::new(&config.embedding)?;
        let exemplars = match &config.chain.exemplars_path {
            Some(path) => load_exemplars(Path::new(path))?,
            None => default_exemplars(),
        };
        let chain = Self::from_parts(db, llm, embedder, exemplars, config.chain.clone()).await?;
        info!("3. Few-shot prompt and embeddings ready ({} exemplars)", chain.index.len());

        info!("4. SQL chain ready to receive questions");
        Ok(chain)
    }

    pub async fn from_parts(
        db: Database,
        llm: LlmManager,
        embedder: EmbeddingManager,
        exemplars: Vec<Exemplar>,
        settings: ChainConfig,
    ) -> Result<Self, ChainError> {
        let index = ExampleIndex::build(exemplars, &embedder).await?;
        Ok(Self {
            db,
            llm,
            embedder,
            index,
            assembler: PromptAssembler::new(settings.top_k),
            settings,
        })
    }

    pub async fn ask(&self, question: &str) -> Result<QueryResult, ChainError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChainError::EmptyQuestion);
        }

        let start = Instant::now();
        info!("Question: {}", question);

        let table_info = self.db.table_info().await?;
        let selected = self.index.select(question, self.settings.k, &self.embedder).await?;
        let exemplars: Vec<&Exemplar> = selected.iter().map(|s| &s.exemplar).collect();
        let prompt = self.assembler.build(question, &table_info, &exemplars);

        let sql_prompt = self.assembler.sql_prompt(&prompt);
        debug!("SQL prompt:\n{}", sql_prompt);
        let completion = self.llm.generate(&sql_prompt, &[SQL_STOP]).await?;
        let sql = parse::extract_sql(&completion).ok_or(ChainError::NoSql(completion))?;
        info!("Generated SQL: {}", sql);

        let rows = self.db.run_query(&sql).await?;
        let result_text = rows.to_prompt_string();
        debug!("SQLResult: {}", result_text);

        let answer = if self.settings.return_direct {
            result_text
        } else {
            let answer_prompt =
                self.assembler.answer_prompt(&prompt, &format!(" {}", sql), &result_text);
            self.llm
                .generate(&answer_prompt, &[ANSWER_STOP])
                .await?
                .trim()
                .to_string()
        };

        info!("Answered in {}ms", start.elapsed().as_millis());

        Ok(QueryResult {
            question: question.to_string(),
            answer,
            sql: self.settings.include_sql.then_some(sql),
            rows: self.settings.include_rows.then_some(rows),
        })
    }

    pub fn exemplars(&self) -> Vec<Exemplar> {
        self.index.exemplars().cloned().collect()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn llm(&self) -> &LlmManager {
        &self.llm
    }

    pub fn embedder(&self) -> &EmbeddingManager {
        &self.embedder
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::embedding::providers::hashing::HashingEmbedder;
    use crate::llm::TextGenerator;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replies with a fixed SQL completion, then a fixed answer, and records prompts.
    pub(crate) struct ScriptedModel {
        pub sql: String,
        pub answer: String,
        pub calls: Arc<AtomicUsize>,
        pub prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(sql: &str, answer: &str) -> Self {
            Self {
                sql: sql.to_string(),
                answer: answer.to_string(),
                calls: Arc::new(AtomicUsize::new(0)),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedModel {
        async fn generate(&self, prompt: &str, _stop: &[&str]) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.ends_with("\nSQLQuery:") {
                Ok(format!(" {}\nSQLResult: invented", self.sql))
            } else {
                Ok(format!(" {}\nQuestion: invented follow-up", self.answer))
            }
        }

        async fn verify(&self) -> Result<(), LlmError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn settings() -> ChainConfig {
        ChainConfig {
            k: 2,
            top_k: 5,
            include_sql: true,
            include_rows: true,
            return_direct: false,
            exemplars_path: None,
        }
    }

    pub(crate) async fn chain_with(model: ScriptedModel, settings: ChainConfig) -> SqlChain {
        let db = Database::connect(&DatabaseConfig {
            connection_string: ":memory:".to_string(),
            pool_size: 2,
            sample_rows_in_table_info: 3,
            include_tables: Vec::new(),
        })
        .unwrap();
        db.seed().await.unwrap();

        SqlChain::from_parts(
            db,
            LlmManager::from_generator(Box::new(model)),
            EmbeddingManager::from_embedder(Box::new(HashingEmbedder::new(384).unwrap())),
            default_exemplars(),
            settings,
        )
        .await
        .unwrap()
    }

    const NIKE_SQL: &str =
        "SELECT sum(stock_quantity) FROM t_shirts WHERE brand = 'Nike' AND color = 'White' AND size = 'XS'";

    #[tokio::test]
    async fn test_empty_question_makes_no_calls() {
        let model = ScriptedModel::new(NIKE_SQL, "45");
        let calls = Arc::clone(&model.calls);
        let chain = chain_with(model, settings()).await;

        for question in ["", "   ", "\n\t"] {
            assert!(matches!(chain.ask(question).await, Err(ChainError::EmptyQuestion)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let model = ScriptedModel::new(NIKE_SQL, "There are 45 white Nike XS t-shirts.");
        let prompts = Arc::clone(&model.prompts);
        let chain = chain_with(model, settings()).await;

        let result = chain
            .ask("  How many white Nike XS t-shirts do we have?  ")
            .await
            .unwrap();

        assert_eq!(result.question, "How many white Nike XS t-shirts do we have?");
        assert_eq!(result.answer, "There are 45 white Nike XS t-shirts.");
        assert_eq!(result.sql.as_deref(), Some(NIKE_SQL));
        assert_eq!(result.rows.unwrap().rows, vec![vec![json!(45)]]);

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("CREATE TABLE \"t_shirts\""));
        assert!(prompts[0].contains("Question: How many white Nike XS t-shirts do we have?\nSQLQuery:"));
        assert_eq!(prompts[0].matches("\nSQLResult: Result of the SQL query").count(), 2);
        assert!(prompts[1].ends_with(&format!("SQLQuery: {}\nSQLResult: [(45,)]\nAnswer:", NIKE_SQL)));
    }

    #[tokio::test]
    async fn test_repeated_question_is_consistent() {
        let chain = chain_with(ScriptedModel::new(NIKE_SQL, "45"), settings()).await;
        let first = chain.ask("Nike white XS stock?").await.unwrap();
        let second = chain.ask("Nike white XS stock?").await.unwrap();
        assert_eq!(first.sql, second.sql);
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.answer, second.answer);
    }

    #[tokio::test]
    async fn test_return_direct_skips_answer_call() {
        let model = ScriptedModel::new(NIKE_SQL, "unused");
        let calls = Arc::clone(&model.calls);
        let chain = chain_with(
            model,
            ChainConfig {
                return_direct: true,
                include_sql: false,
                include_rows: false,
                ..settings()
            },
        )
        .await;

        let result = chain.ask("Nike white XS stock?").await.unwrap();
        assert_eq!(result.answer, "[(45,)]");
        assert!(result.sql.is_none());
        assert!(result.rows.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_database_error_aborts_request() {
        let model = ScriptedModel::new("SELECT price FROM hats", "unused");
        let calls = Arc::clone(&model.calls);
        let chain = chain_with(model, settings()).await;

        let err = chain.ask("How much are hats?").await.unwrap_err();
        assert!(matches!(err, ChainError::Database(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_sql_completion() {
        let chain = chain_with(ScriptedModel::new("I cannot help with that.", "unused"), settings()).await;
        let err = chain.ask("What is the meaning of life?").await.unwrap_err();
        assert!(matches!(err, ChainError::NoSql(_)));
    }
}
