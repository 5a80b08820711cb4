//! Configuration validation.
//!
//! Runs once at process start, before the request pipeline is built. Serde
//! handles syntax; this module checks that required values are present and
//! that the ones given make sense. All problems are returned, not just the
//! first.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::{is_blank, GatewayConfig};

/// Longest accepted rate-limit window.
pub const MAX_RATE_LIMIT_WINDOW_SECS: u64 = 24 * 60 * 60;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required environment value {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Validate the configuration the server needs before it accepts traffic.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors: Vec<ValidationError> = config
        .database
        .missing_credentials()
        .into_iter()
        .map(ValidationError::Missing)
        .collect();

    if config.mode.is_production() && is_blank(&config.security.encryption_master_key) {
        errors.push(ValidationError::Missing("ENCRYPTION_MASTER_KEY"));
    }

    for ip in &config.security.admin_allowed_ips {
        if ip.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::Invalid {
                field: "security.admin_allowed_ips".into(),
                reason: format!("'{ip}' is not an IP address"),
            });
        }
    }

    for policy in &config.rate_limit.policies {
        if policy.max_requests == 0 || policy.window_secs == 0 {
            errors.push(ValidationError::Invalid {
                field: format!("rate_limit.policies.{}", policy.name),
                reason: "max_requests and window_secs must be positive".into(),
            });
        } else if policy.window_secs > MAX_RATE_LIMIT_WINDOW_SECS {
            errors.push(ValidationError::Invalid {
                field: format!("rate_limit.policies.{}", policy.name),
                reason: format!("window_secs must not exceed {MAX_RATE_LIMIT_WINDOW_SECS}"),
            });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Invalid {
            field: "timeouts.request_secs".into(),
            reason: "must be positive".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RunMode;

    fn complete() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.database.url = "bank.db".into();
        config.database.anon_key = Some("anon".into());
        config.database.service_role_key = Some("service".into());
        config
    }

    #[test]
    fn complete_development_config_passes() {
        assert!(validate_config(&complete()).is_ok());
    }

    #[test]
    fn production_requires_encryption_key() {
        let mut config = complete();
        config.mode = RunMode::Production;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::Missing("ENCRYPTION_MASTER_KEY")]);

        config.security.encryption_master_key = Some("k".repeat(32));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = GatewayConfig::default();
        config.security.admin_allowed_ips = vec!["1.2.3.4".into(), "not-an-ip".into()];
        config.rate_limit.policies[0].window_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::Missing("DATABASE_URL")));
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("'not-an-ip' is not an IP address")));
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("rate_limit.policies.general")));
    }

    #[test]
    fn window_longer_than_a_day_is_rejected() {
        let mut config = complete();
        config.rate_limit.policies[1].window_secs = MAX_RATE_LIMIT_WINDOW_SECS;
        assert!(validate_config(&config).is_ok());

        config.rate_limit.policies[1].window_secs = u64::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("rate_limit.policies.auth"));
    }
}
