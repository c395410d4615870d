//! Shared Application State
//!
//! This module defines the `AppState` struct, the server context built once at
//! startup and handed to every connection handler.

use crate::ws::provider::SessionConnector;
use live_relay_core::LiveSessionConfig;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Opens one upstream session per client connection.
    pub connector: Arc<dyn SessionConnector>,
    /// Resolved upstream session parameters, reused for every session.
    pub session_config: Arc<LiveSessionConfig>,
}

impl AppState {
    pub fn new(connector: Arc<dyn SessionConnector>, session_config: LiveSessionConfig) -> Self {
        Self {
            connector,
            session_config: Arc::new(session_config),
        }
    }
}
