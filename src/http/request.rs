//! Request identification.
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing: the outermost layer
//!   sets `x-request-id` (UUID v4) unless the client already sent one
//! - The same id is echoed on the response, rejections included

use axum::http::{HeaderMap, HeaderName};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};

pub const X_REQUEST_ID: &str = "x-request-id";

pub fn x_request_id() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// Layer that assigns an id to requests arriving without one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(x_request_id(), MakeRequestUuid)
}

/// Layer that copies the request's id onto its response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(x_request_id())
}

/// Read the id the set layer assigned.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
