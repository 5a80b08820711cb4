//! Per-request state shared by the pipeline stages.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, Request, Uri},
};

use crate::http::request::request_id;
use crate::security::rate_limit::RateLimitSnapshot;

/// Everything a stage may inspect or rewrite about the inbound request.
///
/// Built once from the buffered request; stages mutate it in order and the
/// middleware turns it back into a request for the route handler.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Parsed body when it is JSON.
    pub json: Option<serde_json::Value>,
    pub client_ip: Option<IpAddr>,
    pub request_id: String,
    pub started: Instant,
    /// Set by the origin check when the request's `Origin` is admitted.
    pub allowed_origin: Option<HeaderValue>,
    /// CORS preflight from an admitted origin; answered without a handler.
    pub preflight: bool,
    /// Tightest rate-limit window that applied, for the `X-RateLimit-*` headers.
    pub rate_limit: Option<RateLimitSnapshot>,
    pub(crate) query_modified: bool,
    pub(crate) json_modified: bool,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let request_id = request_id(&parts.headers).to_string();
        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let mut ctx = Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query,
            headers: parts.headers.clone(),
            body,
            json: None,
            client_ip,
            request_id,
            started: Instant::now(),
            allowed_origin: None,
            preflight: false,
            rate_limit: None,
            query_modified: false,
            json_modified: false,
        };
        if ctx.is_json() && !ctx.body.is_empty() {
            ctx.json = serde_json::from_slice(&ctx.body).ok();
        }
        ctx
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE)
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Client IP for keying and logging; "unknown" when no peer address.
    pub fn client_key(&self) -> String {
        self.client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Rebuild the request for the route handler, carrying over any
    /// rewritten query string or body. Leaves the context usable by the
    /// response stages.
    pub fn take_request(&mut self, mut parts: Parts) -> Request<Body> {
        if self.query_modified {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            let path_and_query = if query.is_empty() {
                self.path.clone()
            } else {
                format!("{}?{}", self.path, query)
            };
            let mut uri_parts = parts.uri.clone().into_parts();
            match path_and_query.parse() {
                Ok(pq) => {
                    uri_parts.path_and_query = Some(pq);
                    if let Ok(uri) = Uri::from_parts(uri_parts) {
                        parts.uri = uri;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Sanitized query did not form a valid URI");
                }
            }
        }

        let body = std::mem::take(&mut self.body);
        let body = match self.json.take() {
            Some(json) if self.json_modified => match serde_json::to_vec(&json) {
                Ok(bytes) => {
                    parts
                        .headers
                        .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                    Bytes::from(bytes)
                }
                Err(_) => body,
            },
            _ => body,
        };

        Request::from_parts(parts, Body::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::X_REQUEST_ID;

    fn parts(uri: &str, content_type: Option<&str>) -> Parts {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let mut request = builder.header(X_REQUEST_ID, "req-1").body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5000))));
        request.into_parts().0
    }

    #[test]
    fn captures_request_fields() {
        let parts = parts("/api/items?q=a%20b&page=2", Some("application/json; charset=utf-8"));
        let ctx = RequestContext::from_parts(&parts, Bytes::from_static(br#"{"x":1}"#));

        assert_eq!(ctx.path, "/api/items");
        assert_eq!(
            ctx.query,
            vec![("q".to_string(), "a b".to_string()), ("page".to_string(), "2".to_string())]
        );
        assert_eq!(ctx.request_id, "req-1");
        assert_eq!(ctx.client_key(), "10.0.0.7");
        assert_eq!(ctx.json, Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn non_json_body_is_not_parsed() {
        let parts = parts("/api/upload", Some("multipart/form-data; boundary=x"));
        let ctx = RequestContext::from_parts(&parts, Bytes::from_static(b"--x--"));
        assert!(ctx.json.is_none());
    }

    #[test]
    fn rewritten_query_and_body_reach_the_request() {
        let original = parts("/api/items?q=old", Some("application/json"));
        let mut ctx = RequestContext::from_parts(&original, Bytes::from_static(br#"{"a":"old"}"#));
        ctx.query = vec![("q".into(), "new value".into())];
        ctx.query_modified = true;
        ctx.json = Some(serde_json::json!({"a": "new"}));
        ctx.json_modified = true;

        let request = ctx.take_request(original);
        assert_eq!(request.uri().path(), "/api/items");
        assert_eq!(request.uri().query(), Some("q=new+value"));
        assert_eq!(request.headers()[header::CONTENT_LENGTH], "11");
    }
}
