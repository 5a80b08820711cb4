use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::GatewayError;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: String,
}

/// `GET /api/ping`
pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        message: state.config.api.ping_message.clone(),
    })
}

/// Fallback for unmatched routes.
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound("Route not found".into())
}
