//! itinera server entry point.
//!
//! Boots the worker, runs install and activate to completion, then serves
//! MCP on stdio transport. Logging goes to stderr to avoid interfering with
//! the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use itinera_client::{FetchClient, FetchConfig};
use itinera_core::{AppConfig, CacheDb, ServiceWorker, SystemClock};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use url::Url;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let origin = Url::parse(&config.origin).context("invalid origin")?;

    tracing::info!(
        generation = %config.cache_name,
        db = %config.db_path.display(),
        "Starting itinera worker on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = Arc::new(ServiceWorker::new(db, &config, network, Arc::new(SystemClock))?);

    // No tool call is served before install and activate settle.
    match worker.install().await {
        Ok(report) => {
            if report.skip_waiting {
                worker.skip_waiting().await?;
            }
        }
        Err(e) => tracing::warn!(
            error = %e,
            controlling = worker.is_controlling(),
            "install failed, sw_install may retry"
        ),
    }

    let handler = handler::ItineraServer::new(worker, origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
