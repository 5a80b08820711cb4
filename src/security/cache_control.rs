//! No-store caching on every response, plus extra hardening on sensitive
//! paths.

use axum::{
    http::{header, HeaderValue},
    response::Response,
};

use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

pub struct CacheControl {
    sensitive_markers: Vec<String>,
}

impl CacheControl {
    pub fn new(sensitive_markers: Vec<String>) -> Self {
        Self { sensitive_markers }
    }

    fn is_sensitive(&self, path: &str) -> bool {
        self.sensitive_markers.iter().any(|m| path.contains(m.as_str()))
    }
}

impl Stage for CacheControl {
    fn name(&self) -> &'static str {
        "cache_control"
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

        if self.is_sensitive(&ctx.path) {
            headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
            headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Bytes, http::Request};

    fn respond(path: &str) -> Response {
        let (parts, _) = Request::builder().uri(path).body(()).unwrap().into_parts();
        let ctx = RequestContext::from_parts(&parts, Bytes::new());
        let mut response = Response::new(Default::default());
        CacheControl::new(vec!["/admin".into(), "/api/auth".into()]).on_response(&ctx, &mut response);
        response
    }

    #[test]
    fn all_responses_are_uncacheable() {
        let response = respond("/api/ping");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");
        assert_eq!(response.headers()[header::EXPIRES], "0");
        assert!(response.headers().get(header::X_XSS_PROTECTION).is_none());
    }

    #[test]
    fn sensitive_paths_get_xss_protection() {
        let response = respond("/api/auth/register");
        assert_eq!(response.headers()[header::X_XSS_PROTECTION], "1; mode=block");
        let response = respond("/api/admin/migrations");
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    }
}
