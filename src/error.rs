//! Request-level error type and its HTTP rendering.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use crate::database::store::StoreError;
use crate::migrations::MigrationError;

/// Errors that end a request.
///
/// Every variant maps to one status code. Pipeline stages and route handlers
/// both return this type so the rendered body has one shape.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not allowed by CORS policy")]
    OriginNotAllowed { origin: String },

    #[error("{0}")]
    ContentType(&'static str),

    #[error("{message}")]
    RateLimited {
        policy: String,
        message: String,
        retry_after_secs: u64,
    },

    #[error("Access denied from this IP address")]
    IpNotAllowed { ip: Option<String> },

    #[error("Service configuration error")]
    ServiceConfiguration { missing: Vec<&'static str> },

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::OriginNotAllowed { .. } | GatewayError::IpNotAllowed { .. } => {
                StatusCode::FORBIDDEN
            }
            GatewayError::ContentType(_) | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::ServiceConfiguration { .. }
            | GatewayError::Database(_)
            | GatewayError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::OriginNotAllowed { .. } => "origin_not_allowed",
            GatewayError::ContentType(_) => "content_type",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::IpNotAllowed { .. } => "ip_not_allowed",
            GatewayError::ServiceConfiguration { .. } => "service_configuration",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Conflict(_) => "conflict",
            GatewayError::Database(_) => "database",
            GatewayError::Migration(_) => "migration",
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => GatewayError::NotFound(what),
            StoreError::Conflict(what) => GatewayError::Conflict(what),
            StoreError::Invalid(why) => GatewayError::BadRequest(why),
            StoreError::Database(e) => GatewayError::Database(e),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        if let GatewayError::RateLimited {
            retry_after_secs, ..
        } = &self
        {
            body["retry_after"] = json!(retry_after_secs);
        }
        if status.is_server_error() {
            // Stripped again in production by the error detail stage.
            body["detail"] = json!(format!("{self:?}"));
        }

        let mut response = (status, Json(body)).into_response();
        if let GatewayError::RateLimited {
            retry_after_secs, ..
        } = &self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        response
    }
}
