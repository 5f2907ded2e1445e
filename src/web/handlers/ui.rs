use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use minijinja::context;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;
use crate::web::templates::render_template;

#[derive(Debug, Deserialize)]
pub struct AskForm {
    pub question: Option<String>,
}

// Main UI entry point: the form, plus the answer when a question was submitted
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(form): Query<AskForm>,
) -> impl IntoResponse {
    let question = form.question.unwrap_or_default();

    let ctx = if question.trim().is_empty() {
        context! { question => question }
    } else {
        match state.chain.ask(&question).await {
            Ok(result) => context! {
                question => question,
                answer => result.answer,
                sql => result.sql,
            },
            Err(e) => {
                error!("Failed to answer question from the web form: {}", e);
                context! { question => question, error => e.to_string() }
            }
        }
    };

    Html(render_template(&state.template_env, "index.html", ctx))
}
