//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (body buffered up to max_body_size):
//!     → headers.rs        (response: CSP, HSTS, frame/sniff/referrer policy)
//!     → cors.rs           (origin allow-list, preflight short-circuit)
//!     → request_log.rs    (response: access log)
//!     → sanitize.rs       (strip script patterns from JSON body and query)
//!     → content_type.rs   (JSON or, on upload paths, multipart)
//!     → cache_control.rs  (response: no-store, sensitive-path hardening)
//!     → upstream.rs       (database credentials present)
//!     → rate_limit.rs     (fixed-window policies per client IP)
//!     → access_control.rs (admin IP allow-list, production only)
//!     → error_detail.rs   (response: redact 5xx bodies in production)
//!     → route handler
//! ```
//!
//! # Design Decisions
//! - Stages share one explicit `RequestContext` instead of request extensions
//! - The first rejecting stage ends the request; response stages still run
//! - Fail closed: an empty admin allow-list admits nobody
//! - Counters live in an injected `RateLimiter`, never in a global

pub mod access_control;
pub mod cache_control;
pub mod content_type;
pub mod context;
pub mod cors;
pub mod error_detail;
pub mod headers;
pub mod pipeline;
pub mod rate_limit;
pub mod request_log;
pub mod sanitize;
pub mod upstream;

pub use context::RequestContext;
pub use pipeline::{security_middleware, SecurityPipeline, Stage};
pub use rate_limit::RateLimiter;
