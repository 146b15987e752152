//! Pulsebox API Server Binary
//!
//! Entry point for the Pulsebox metric ingestion server.

#![deny(unsafe_code)]

use anyhow::Result;
use api::{init_tracing, run_server_with_config, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    run_server_with_config(config).await
}
