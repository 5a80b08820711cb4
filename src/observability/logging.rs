//! Structured logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the level comes from
//! `observability.log_level`. Production emits one JSON object per line,
//! development the human-readable format.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{ObservabilityConfig, RunMode};

/// Default filter directives for a given level.
pub fn default_directives(level: &str) -> String {
    format!("bank_gateway={level},migrate={level},tower_http=info")
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_tracing(config: &ObservabilityConfig, mode: RunMode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(&config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if mode.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse_as_filter() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("bank_gateway=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
