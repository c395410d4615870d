//! Axum Handlers for the plain HTTP endpoints.

use crate::state::AppState;
use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    /// Resource name of the retrieval corpus sessions are grounded on.
    pub grounding: Option<String>,
}

/// Reports that the gateway is serving and which upstream configuration it uses.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.session_config;
    Json(HealthResponse {
        status: "ok",
        model: config.model.clone(),
        grounding: config.grounding.as_ref().map(|corpus| corpus.name.clone()),
    })
}
