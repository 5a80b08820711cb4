//! Administrative endpoints.
//!
//! Mounted under `/api/admin`, so the security pipeline applies the auth
//! rate-limit policy and, in production, the admin IP allow-list.

pub mod handlers;

use axum::{routing::get, Router};

use crate::http::server::AppState;
use self::handlers::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/migrations", get(get_migrations))
}
