//! Pulsebox CLI
//!
//! Command-line interface for working directly with the Pulsebox metric log
//! database.
//!
//! # Usage
//!
//! ```bash
//! pulsebox --help
//! pulsebox init
//! pulsebox ingest payload.json
//! echo '{"device_id": "pc01", "metrics": {"system": {"ram": 50}}}' | pulsebox ingest
//! pulsebox logs --limit 20
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::ingest::{CategorySet, IngestRequest, MetricIngestor};
use shared::query::{recent_logs, RECENT_LOGS_LIMIT};
use shared::storage::{MetricLogStore, SqliteMetricLogStore};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pulsebox CLI - metric log database tooling
#[derive(Parser)]
#[command(name = "pulsebox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// `SQLite` database URL
    #[arg(
        short,
        long,
        env = "PULSEBOX_DATABASE_URL",
        default_value = "sqlite://metrics.db"
    )]
    database_url: String,

    /// Comma-separated metric categories to store on ingest
    #[arg(long, env = "PULSEBOX_METRIC_CATEGORIES", default_value = "system,weather")]
    categories: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the metric log table if it does not exist
    Init,
    /// Ingest an agent payload from a file, or stdin when no file is given
    Ingest {
        /// Path to a JSON payload ("-" for stdin)
        file: Option<PathBuf>,
    },
    /// Print the most recent records as JSON, newest first
    Logs {
        /// Maximum number of records to print
        #[arg(short, long, default_value_t = RECENT_LOGS_LIMIT)]
        limit: usize,
    },
    /// Print the number of stored records
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    run(cli, &mut std::io::stdout()).await
}

async fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    // Only the writing commands may create the database.
    let opened = match &cli.command {
        Commands::Init | Commands::Ingest { .. } => {
            SqliteMetricLogStore::open_shared(&cli.database_url, 1).await
        }
        Commands::Logs { .. } | Commands::Count => {
            SqliteMetricLogStore::connect_existing(&cli.database_url, 1)
                .await
                .map(Arc::new)
        }
    };
    let store = opened.with_context(|| format!("Failed to open database {}", cli.database_url))?;

    let result = execute(&cli, &store, out).await;
    store.close().await;
    result
}

async fn execute<W: Write>(
    cli: &Cli,
    store: &Arc<SqliteMetricLogStore>,
    out: &mut W,
) -> Result<()> {
    match &cli.command {
        Commands::Init => {
            writeln!(out, "Metric log schema ready in {}", cli.database_url)?;
        }
        Commands::Ingest { file } => {
            let categories = CategorySet::parse(&cli.categories);
            if categories.is_empty() {
                bail!("--categories must name at least one category");
            }

            let body = read_payload(file.as_deref())?;
            let request = IngestRequest::from_slice(&body)?;
            let shared_store: Arc<dyn MetricLogStore> = store.clone();
            let ids = MetricIngestor::new(shared_store, categories)
                .ingest(&request)
                .await?;

            tracing::info!(stored = ids.len(), "Payload ingested");
            writeln!(out, "{}", serde_json::to_string(&ids)?)?;
        }
        Commands::Logs { limit } => {
            let logs = recent_logs(&**store, *limit).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&logs)?)?;
        }
        Commands::Count => {
            writeln!(out, "{}", store.count().await?)?;
        }
    }

    Ok(())
}

fn read_payload(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read(path)
            .with_context(|| format!("Failed to read payload from {}", path.display())),
        _ => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("Failed to read payload from stdin")?;
            Ok(body)
        }
    }
}
