//! harbor server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport and
//! acts as the host for the worker: lifecycle, fetch, message, sync, push and
//! click events arrive as tool calls, and a background scheduler drives
//! periodic refresh and sync replay.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use harbor_client::{FetchClient, FetchConfig, TracingSink, Worker};
use harbor_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod scheduler;
#[cfg(test)]
mod testing;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, "Starting harbor server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = Worker::new(config, db, fetcher, Arc::new(TracingSink))?;

    let _scheduler = scheduler::spawn(worker.clone());

    let handler = handler::HarborServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
