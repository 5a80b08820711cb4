//! Cross-origin policy.
//!
//! Requests without an `Origin` header (curl, mobile apps, server-to-server)
//! always pass. Development mode also admits any loopback origin. Everything
//! else must be on the allow-list.

use axum::{
    http::{header, HeaderValue, Method},
    response::Response,
};

use crate::config::RunMode;
use crate::error::GatewayError;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";
const EXPOSE_HEADERS: &str = "X-RateLimit-Limit, X-RateLimit-Remaining, X-RateLimit-Reset";
const PREFLIGHT_MAX_AGE: &str = "600";

pub struct OriginPolicy {
    mode: RunMode,
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(mode: RunMode, allowed: Vec<String>) -> Self {
        Self { mode, allowed }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        if !self.mode.is_production() && is_loopback(origin) {
            return true;
        }
        self.allowed.iter().any(|o| o == origin)
    }
}

fn is_loopback(origin: &str) -> bool {
    origin.contains("localhost") || origin.contains("127.0.0.1")
}

impl Stage for OriginPolicy {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        let Some(origin) = ctx.headers.get(header::ORIGIN).cloned() else {
            return Ok(());
        };
        let origin_str = origin.to_str().unwrap_or_default();
        if !self.is_allowed(origin_str) {
            return Err(GatewayError::OriginNotAllowed {
                origin: origin_str.to_string(),
            });
        }

        ctx.preflight = ctx.method == Method::OPTIONS
            && ctx.headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
        ctx.allowed_origin = Some(origin);
        Ok(())
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(origin) = &ctx.allowed_origin else {
            return;
        };
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
        if ctx.preflight {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(PREFLIGHT_MAX_AGE),
            );
        }
    }
}
