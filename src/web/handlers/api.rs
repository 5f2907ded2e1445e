use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::{ChainError, QueryResult};
use crate::fewshot::exemplars::Exemplar;
use crate::web::state::AppState;

#[derive(Debug, Deserialize, Clone)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub table_count: usize,
    pub exemplar_count: usize,
    pub llm_backend: String,
    pub llm_model: String,
    pub embedding_backend: String,
}

fn chain_error_response(e: ChainError) -> (StatusCode, String) {
    match e {
        ChainError::EmptyQuestion => (StatusCode::BAD_REQUEST, e.to_string()),
        other => {
            error!("Failed to answer question: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

// Natural language question -> answer, SQL and (optionally) rows
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<QueryResult>, (StatusCode, String)> {
    info!("API question: {}", payload.question);
    let result = state
        .chain
        .ask(&payload.question)
        .await
        .map_err(chain_error_response)?;
    Ok(Json(result))
}

pub async fn list_exemplars(State(state): State<Arc<AppState>>) -> Json<Vec<Exemplar>> {
    Json(state.chain.exemplars())
}

// Schema as shown to the model
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
) -> Result<Json<String>, (StatusCode, String)> {
    let info = state.chain.database().table_info().await.map_err(|e| {
        error!("Failed to get table info: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;
    Ok(Json(info))
}

// System status
pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatus>, (StatusCode, String)> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    let tables = state.chain.database().table_names().await.map_err(|e| {
        error!("Failed to list tables: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
    })?;

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        table_count: tables.len(),
        exemplar_count: state.chain.exemplars().len(),
        llm_backend: state.chain.llm().backend_name().to_string(),
        llm_model: state.config.llm.model.clone(),
        embedding_backend: state.chain.embedder().backend_name().to_string(),
    }))
}
