//! Content-Type enforcement for mutating requests.

use axum::http::Method;

use crate::error::GatewayError;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

const JSON: &str = "application/json";
const MULTIPART: &str = "multipart/form-data";

/// POST, PUT and PATCH must send JSON. Paths containing an upload marker may
/// send multipart form data instead.
pub struct ContentTypeCheck {
    upload_markers: Vec<String>,
}

impl ContentTypeCheck {
    pub fn new(upload_markers: Vec<String>) -> Self {
        Self { upload_markers }
    }

    fn is_upload_path(&self, path: &str) -> bool {
        self.upload_markers.iter().any(|m| path.contains(m.as_str()))
    }
}

impl Stage for ContentTypeCheck {
    fn name(&self) -> &'static str {
        "content_type"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        if !matches!(ctx.method, Method::POST | Method::PUT | Method::PATCH) {
            return Ok(());
        }
        let content_type = ctx.content_type().unwrap_or_default();

        if self.is_upload_path(&ctx.path) {
            if content_type.contains(MULTIPART) || content_type.contains(JSON) {
                return Ok(());
            }
            return Err(GatewayError::ContentType(
                "Invalid content type for upload endpoint",
            ));
        }

        if content_type.contains(JSON) {
            Ok(())
        } else {
            Err(GatewayError::ContentType("Content-Type must be application/json"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Bytes,
        http::{header, Request},
    };

    fn check(method: Method, path: &str, content_type: Option<&str>) -> Result<(), GatewayError> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        let mut ctx = RequestContext::from_parts(&parts, Bytes::new());
        ContentTypeCheck::new(vec!["/upload".into(), "/kyc".into(), "/mobile-deposit".into()])
            .on_request(&mut ctx)
    }

    #[test]
    fn json_required_on_ordinary_endpoints() {
        assert!(check(Method::POST, "/api/transfers", Some("application/json; charset=utf-8")).is_ok());

        let err = check(Method::POST, "/api/transfers", Some("text/plain")).unwrap_err();
        assert_eq!(err.to_string(), "Content-Type must be application/json");
        assert!(check(Method::PATCH, "/api/users/1", None).is_err());
    }

    #[test]
    fn upload_paths_accept_multipart() {
        assert!(check(Method::POST, "/api/kyc/upload", Some("multipart/form-data; boundary=x")).is_ok());
        assert!(check(Method::POST, "/api/mobile-deposit", Some("application/json")).is_ok());

        let err = check(Method::PUT, "/api/upload", Some("text/csv")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid content type for upload endpoint");
    }

    #[test]
    fn safe_methods_are_not_checked() {
        assert!(check(Method::GET, "/api/accounts/1", None).is_ok());
        assert!(check(Method::DELETE, "/api/accounts/1", Some("text/plain")).is_ok());
    }
}
