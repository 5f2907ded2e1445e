use crate::chain::SqlChain;
use crate::config::AppConfig;
use crate::web::templates::init_templates;
use minijinja::Environment;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub chain: Arc<SqlChain>,
    pub template_env: Environment<'static>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, chain: Arc<SqlChain>) -> Self {
        Self {
            config,
            chain,
            template_env: init_templates(),
            startup_time: chrono::Utc::now(),
        }
    }
}
