use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::RunMode;
use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::migrations::StatusReport;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub mode: RunMode,
    pub rate_limited_clients: usize,
}

/// `GET /api/admin/status`
pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        mode: state.config.mode,
        rate_limited_clients: state.rate_limiter.tracked_keys(),
    })
}

/// `GET /api/admin/migrations`
///
/// Read-only: the same report `migrate status` prints.
pub async fn get_migrations(
    State(state): State<AppState>,
) -> Result<Json<StatusReport>, GatewayError> {
    Ok(Json(state.migrations.status()?))
}
