use clap::{Parser, Subcommand};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// DuckDB database file, or `:memory:`
    pub connection_string: String,
    pub pool_size: usize,
    pub sample_rows_in_table_info: usize,
    /// Restrict the schema shown to the model. Empty means every table.
    #[serde(default)]
    pub include_tables: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "gemini", "remote", or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub backend: String, // "fastembed", "ollama", "remote", or "hashing" (offline tests)
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    /// Vector length produced by the hashing backend
    pub dimensions: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChainConfig {
    /// Number of exemplars placed in the prompt
    pub k: usize,
    /// Row limit the model is told to apply
    pub top_k: usize,
    pub include_sql: bool,
    pub include_rows: bool,
    /// Skip the answer-phrasing call and return the raw result
    pub return_direct: bool,
    pub exemplars_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub chain: ChainConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the web form and JSON API (default)
    Serve,
    /// Ask questions interactively until `exit` or `quit`
    Repl,
    /// Answer a single question and exit
    Ask {
        question: String,
    },
    /// Check connectivity to the database, model and embedding backends
    Verify,
    /// Create the t_shirts and discounts tables with the sample inventory
    Seed,
    /// Replace a table with the contents of a CSV file
    Load {
        table: String,
        path: PathBuf,
    },
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/tshirt-sql/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Credentials come from the environment, e.g. TSHIRT_SQL__LLM__API_KEY
        config_builder = config_builder.add_source(environment());

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }

        Ok(config)
    }
}

// TSHIRT_SQL__SECTION__KEY; list values are comma separated
fn environment() -> Environment {
    Environment::with_prefix("TSHIRT_SQL")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("database.include_tables")
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "inventory.duckdb".to_string(),
                pool_size: 5,
                sample_rows_in_table_info: 3,
                include_tables: Vec::new(),
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "gemini".to_string(),
                model: "gemini-2.5-flash".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.2,
                timeout_secs: 60,
            },
            embedding: EmbeddingConfig {
                backend: "fastembed".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                api_key: None,
                api_url: None,
                dimensions: 384,
                timeout_secs: default_embedding_timeout(),
            },
            chain: ChainConfig {
                k: 2,
                top_k: 5,
                include_sql: true,
                include_rows: false,
                return_direct: false,
                exemplars_path: None,
            },
        }
    }
}
