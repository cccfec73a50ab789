use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use verification_history::{
    config::{Config, LogFormat},
    server::{handle_route, AppState, HistoryServer, RouteRequest},
    storage::{import_records, SqliteStorage},
};

#[derive(Debug, Parser)]
#[command(name = "verification-history", version, about = "Verification history service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve line-delimited JSON requests on stdin (default)
    Serve,
    /// Load newline-delimited verification records into the database
    Import {
        /// File with one JSON record per line
        file: PathBuf,
    },
    /// Run a single request and print the response
    Query {
        /// Resource to query
        #[arg(short, long, default_value = "history")]
        resource: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
        /// Path parameter as key=value (repeatable)
        #[arg(short = 'p', long = "path", value_parser = parse_key_value)]
        path: Vec<(String, String)>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Verification history service starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = Arc::new(AppState::new(config, Arc::new(storage)));
            let server = HistoryServer::new(state);

            info!("Server ready, waiting for requests on stdin...");

            if let Err(e) = server.run().await {
                error!(error = %e, "Server error");
                return Err(e.into());
            }

            info!("Server shutdown complete");
        }
        Command::Import { file } => {
            let content = tokio::fs::read_to_string(&file).await?;
            let summary = import_records(&storage, &content).await?;
            info!(
                file = %file.display(),
                imported = summary.imported,
                rejected = summary.rejected,
                "Import complete"
            );
        }
        Command::Query {
            resource,
            query,
            path,
        } => {
            let state = Arc::new(AppState::new(config, Arc::new(storage)));
            let request = RouteRequest {
                resource: Some(resource),
                query_parameters: query.into_iter().collect(),
                path_parameters: path.into_iter().collect(),
                ..Default::default()
            };
            let response = handle_route(&state, request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
