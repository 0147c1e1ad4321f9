//! Campus server entry point.
//!
//! Reads [`ServerConfig`] from flags and the environment, opens the store and
//! runs the background workers until interrupted. The network transport
//! attaches through [`RpcServer::call`].

use anyhow::Context as _;
use clap::Parser;

use campus_server::{open_store, telemetry, RpcServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    telemetry::init_tracing(config.log_format)?;

    let store = open_store(&config.database_url)
        .with_context(|| format!("failed to open store at {}", config.database_url))?;
    let server = RpcServer::start(config, store)?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    server.shutdown().await;
    Ok(())
}
