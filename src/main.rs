use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod chain;
mod cli;
mod config;
mod db;
mod embedding;
mod fewshot;
mod llm;
mod util;
mod web;

use crate::chain::SqlChain;
use crate::config::{AppConfig, CliArgs, Command};
use crate::db::Database;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Seed => {
            let db = Database::connect(&config.database)?;
            let rows = db.seed().await?;
            info!("Seeded {} t-shirt rows into {}", rows, config.database.connection_string);
            println!("Seeded {} t-shirt rows.", rows);
        }
        Command::Load { table, path } => {
            let db = Database::connect(&config.database)?;
            let rows = db.load_csv(path.clone(), table.clone()).await?;
            info!("Loaded {} rows from {} into {}", rows, path.display(), table);
            println!("Loaded {} rows into {}.", rows, table);
        }
        Command::Verify => {
            let chain = SqlChain::build(&config).await?;
            let all_ok = cli::verify(&chain, &mut std::io::stdout()).await?;
            if !all_ok {
                return Err("one or more connectivity checks failed".into());
            }
        }
        Command::Ask { question } => {
            let chain = SqlChain::build(&config).await?;
            let result = chain.ask(&question).await?;
            println!("{}", result.answer);
            if let Some(sql) = result.sql {
                println!("SQL: {}", sql);
            }
        }
        Command::Repl => {
            let chain = SqlChain::build(&config).await?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            cli::run_repl(&chain, stdin, &mut std::io::stdout()).await?;
        }
        Command::Serve => {
            let chain = match SqlChain::build(&config).await {
                Ok(chain) => Arc::new(chain),
                Err(e) => {
                    error!("Failed to initialize the SQL chain: {}", e);
                    return Err(e.into());
                }
            };
            let app_state = Arc::new(AppState::new(config.clone(), chain));

            // Start the web server
            info!("Starting T-Shirt SQL server on {}:{}", config.web.host, config.web.port);
            match web::run_server(config.web, app_state).await {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
