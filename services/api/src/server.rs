//! Process startup: resolve the upstream configuration, then serve.
//!
//! Nothing is bound until grounding has been resolved, so a process that
//! cannot resolve its required configuration never accepts a connection.

use crate::{
    config::{Config, ConfigError},
    router::create_router,
    state::AppState,
    ws::provider::SessionConnector,
};
use live_relay_core::{CorpusCatalog, GroundingError, GroundingMode, resolve_grounding};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Failures that stop the process before it serves anything.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for StartupError {
    fn from(err: ConfigError) -> Self {
        StartupError::Configuration(err.to_string())
    }
}

impl From<GroundingError> for StartupError {
    fn from(err: GroundingError) -> Self {
        match err {
            GroundingError::Configuration(msg) => StartupError::Configuration(msg),
            GroundingError::Unavailable(msg) => StartupError::UpstreamUnavailable(msg),
        }
    }
}

/// Resolves grounding and builds the server context shared by every connection.
pub async fn bootstrap(
    config: &Config,
    catalog: Option<&dyn CorpusCatalog>,
    connector: Arc<dyn SessionConnector>,
) -> Result<Arc<AppState>, StartupError> {
    let mode = config.grounding_mode();
    let grounding = match catalog {
        Some(catalog) => resolve_grounding(catalog, mode, config.rag_corpus.as_deref()).await?,
        None if mode == GroundingMode::Disabled => None,
        None => {
            return Err(StartupError::Configuration(
                "retrieval grounding requested but no corpus catalog is available".to_string(),
            ));
        }
    };

    let session_config = config.session_config(grounding);
    info!(
        model = %session_config.model,
        grounding = ?session_config.grounding.as_ref().map(|c| &c.name),
        "Upstream session configuration resolved."
    );
    Ok(Arc::new(AppState::new(connector, session_config)))
}

/// Serves the gateway on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(state).layer(cors);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Resolves startup configuration, binds the listener, and serves.
pub async fn run<F>(
    config: Config,
    catalog: Option<&dyn CorpusCatalog>,
    connector: Arc<dyn SessionConnector>,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = bootstrap(&config, catalog, connector).await?;

    let listener = TcpListener::bind(config.bind_address).await?;
    info!(
        bind_address = %config.bind_address,
        "Service configured. Accepting connections on /ws."
    );
    serve(listener, state, shutdown).await?;

    info!("Server has shut down.");
    Ok(())
}
