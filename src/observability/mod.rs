//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, JSON in production)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (per-request spans keyed by request id)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every span and log line
//! - Metrics are cheap when no recorder is installed

pub mod logging;
pub mod metrics;
pub mod tracing;
