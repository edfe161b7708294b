//! shelter host entry point.
//!
//! Boots the interceptor over a SQLite cache and serves newline-delimited
//! JSON events on stdio. Logging goes to stderr to keep stdout for replies.

use std::sync::Arc;

use anyhow::{Context, Result};
use shelter_client::{FetchConfig, HttpNetwork, Policy, ServiceWorker};
use shelter_core::{AppConfig, CacheDb};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod protocol;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let policy = Policy::from_config(&config)?;
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let network = HttpNetwork::new(FetchConfig::from(&config))?;

    tracing::info!(generation = %policy.generation, origin = %policy.origin, "starting shelter on stdio");

    let host = handler::Host::new(ServiceWorker::new(Arc::new(db), Arc::new(network), policy));

    match host.worker().install().await {
        Ok(outcome) => tracing::info!(
            entries = outcome.install.entries,
            bytes = outcome.install.bytes,
            "startup install complete"
        ),
        Err(e) => tracing::warn!(error = %e, "startup install failed, serving from existing cache"),
    }

    handler::serve(&host, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("shutting down");
    Ok(())
}
