//! Liveness endpoint listing the handlers this process serves.

use crate::state::GatewayState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process answers.
    pub status: &'static str,
    /// Crate version of the running gateway.
    pub version: &'static str,
    /// Handlers accepting messages on `/v1/ingest/{handler}`, sorted.
    pub handlers: Vec<String>,
}

/// Creates the health routes.
pub fn health_routes(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        handlers: state.handler_names(),
    })
}
