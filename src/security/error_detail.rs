//! Keeps internal error detail out of production responses.

use axum::{
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::config::RunMode;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

pub const REDACTED_MESSAGE: &str = "An internal server error occurred";

/// In production, replaces every 5xx body with a generic message and the
/// request id. Development responses pass through with their detail.
pub struct ErrorDetailPolicy {
    redact: bool,
}

impl ErrorDetailPolicy {
    pub fn new(mode: RunMode) -> Self {
        Self {
            redact: mode.is_production(),
        }
    }
}

impl Stage for ErrorDetailPolicy {
    fn name(&self) -> &'static str {
        "error_detail"
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        if !self.redact || !response.status().is_server_error() {
            return;
        }

        let body = json!({
            "error": REDACTED_MESSAGE,
            "timestamp": Utc::now().to_rfc3339(),
            "request_id": ctx.request_id,
        });
        let mut redacted = (response.status(), Json(body)).into_response();
        let headers = std::mem::take(response.headers_mut());
        for (name, value) in headers.iter() {
            if name != header::CONTENT_LENGTH && name != header::CONTENT_TYPE {
                redacted.headers_mut().append(name.clone(), value.clone());
            }
        }
        *response = redacted;
    }
}
