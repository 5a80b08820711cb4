//! Refuses requests while database credentials are missing.
//!
//! Start-up validation normally stops the process first; this covers
//! pipelines built from an unvalidated configuration.

use crate::config::DatabaseConfig;
use crate::error::GatewayError;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

pub struct UpstreamPrecheck {
    missing: Vec<&'static str>,
}

impl UpstreamPrecheck {
    pub fn new(database: &DatabaseConfig) -> Self {
        Self {
            missing: database.missing_credentials(),
        }
    }
}

impl Stage for UpstreamPrecheck {
    fn name(&self) -> &'static str {
        "upstream_precheck"
    }

    fn on_request(&self, _ctx: &mut RequestContext) -> Result<(), GatewayError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            tracing::error!(missing = ?self.missing, "Missing required environment variables");
            Err(GatewayError::ServiceConfiguration {
                missing: self.missing.clone(),
            })
        }
    }
}
