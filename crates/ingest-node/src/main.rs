//! # Telemetry Ledger Ingest Node
//!
//! Subscribes to the configured device channels, authenticates every
//! reading, commits accepted readings to the hash-linked ledger and
//! re-publishes each committed block.
//!
//! ## Startup Sequence
//!
//! 1. Install the tracing subscriber
//! 2. Load configuration from the environment
//! 3. Refuse to start with an empty secret or no channels
//! 4. Build and start the runtime
//! 5. Run until Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use ingest_node::{logging, NodeConfig, NodeRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    let config = NodeConfig::from_env().context("Invalid configuration")?;
    config
        .validate_for_production()
        .context("Configuration not fit for production")?;

    let runtime = NodeRuntime::new(config).await?;
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
