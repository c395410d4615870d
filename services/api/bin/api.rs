//! Main Entrypoint for the Live Relay API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging and the TLS crypto provider.
//! 3. Resolving the retrieval corpus the upstream model is grounded on.
//! 4. Starting the web server and handling graceful shutdown.
//!
//! Any failure before the listener is bound exits the process with an error.

use anyhow::{Context, anyhow};
use live_relay_api::{config::Config, server, ws::provider::gemini::GeminiConnector};
use live_relay_core::CorpusCatalog;
use std::sync::Arc;
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging and TLS ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;
    info!(
        backend = config.backend.name(),
        location = %config.location,
        model = %config.live_model,
        "Configuration loaded."
    );

    // --- 3. Build the upstream collaborators ---
    let catalog = config.corpus_catalog();
    let connector = Arc::new(GeminiConnector::new(config.endpoint()));

    // --- 4. Resolve grounding and serve ---
    server::run(
        config,
        catalog.as_ref().map(|c| c as &dyn CorpusCatalog),
        connector,
        shutdown_signal(),
    )
    .await
    .context("Gateway failed to start")?;

    Ok(())
}
