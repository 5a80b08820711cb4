//! Fixed security response headers.
//!
//! Applied to every response, including rejections from later stages.

use axum::{
    http::{header, HeaderName, HeaderValue},
    response::Response,
};

use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
     style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
     font-src 'self' https://fonts.gstatic.com; \
     img-src 'self' data: https:; \
     script-src 'self'; \
     object-src 'none'; \
     media-src 'self'; \
     frame-src 'none'; \
     connect-src 'self'; \
     upgrade-insecure-requests";

pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31536000; includeSubDomains; preload";

const HEADERS: [(HeaderName, &str); 5] = [
    (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
    (header::STRICT_TRANSPORT_SECURITY, STRICT_TRANSPORT_SECURITY),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
];

pub struct SecurityHeaders;

impl Stage for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
        let headers = response.headers_mut();
        for (name, value) in HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Bytes, http::Request};

    #[test]
    fn every_response_gets_the_policy() {
        let (parts, _) = Request::builder().uri("/api/ping").body(()).unwrap().into_parts();
        let ctx = RequestContext::from_parts(&parts, Bytes::new());
        let mut response = Response::new(Default::default());

        SecurityHeaders.on_response(&ctx, &mut response);

        let headers = response.headers();
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::STRICT_TRANSPORT_SECURITY], STRICT_TRANSPORT_SECURITY);
        assert!(headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .starts_with("default-src 'self'"));
    }
}
