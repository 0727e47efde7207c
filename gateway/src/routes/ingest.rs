//! Ingestion endpoint.
//!
//! Each request body is one transport message for the named handler.

use crate::state::GatewayState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::pipeline::PipelineError;

/// Response for an accepted message.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Handler that processed the message.
    pub handler: String,
    /// Human readable outcome.
    pub message: String,
}

/// Response for a rejected message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind.
    pub error: String,
    /// Error details.
    pub message: String,
}

type IngestResult = Result<(StatusCode, Json<IngestResponse>), (StatusCode, Json<ErrorResponse>)>;

/// Creates the ingestion routes.
pub fn ingest_routes(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/ingest/{handler}", post(ingest))
        .with_state(state)
}

async fn ingest(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
    body: Bytes,
) -> IngestResult {
    let Some(handler) = state.handler(&name) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "unknown_handler".to_string(),
                message: format!("no handler named '{name}' is running"),
            }),
        ));
    };

    let bus = state.bus().as_ref();
    match handler.handle(&body, state.report_errors(), bus, bus).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(IngestResponse {
                handler: name,
                message: "message accepted".to_string(),
            }),
        )),
        Err(e) => {
            let (status, error) = match e {
                PipelineError::Decode(_) => (StatusCode::UNPROCESSABLE_ENTITY, "decode_error"),
                PipelineError::Format(_) => (StatusCode::UNPROCESSABLE_ENTITY, "format_error"),
                PipelineError::Publish(_) => (StatusCode::SERVICE_UNAVAILABLE, "bus_closed"),
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: error.to_string(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}
