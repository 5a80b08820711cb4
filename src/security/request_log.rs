//! Access log.
//!
//! Development logs every request. Production logs only responses with
//! status >= 400.

use axum::{http::header, response::Response};

use crate::config::RunMode;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

pub struct RequestLogger {
    log_all: bool,
}

impl RequestLogger {
    pub fn new(mode: RunMode) -> Self {
        Self {
            log_all: !mode.is_production(),
        }
    }

    pub fn should_log(&self, status: u16) -> bool {
        self.log_all || status >= 400
    }
}

impl Stage for RequestLogger {
    fn name(&self) -> &'static str {
        "request_logging"
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let status = response.status().as_u16();
        if !self.should_log(status) {
            return;
        }

        tracing::info!(
            method = %ctx.method,
            path = %ctx.path,
            status,
            duration_ms = ctx.started.elapsed().as_millis() as u64,
            ip = %ctx.client_key(),
            user_agent = ctx.header(header::USER_AGENT).unwrap_or("-"),
            request_id = %ctx.request_id,
            "Request"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_logs_only_errors() {
        let logger = RequestLogger::new(RunMode::Production);
        assert!(!logger.should_log(200));
        assert!(!logger.should_log(302));
        assert!(logger.should_log(400));
        assert!(logger.should_log(503));
    }

    #[test]
    fn development_logs_everything() {
        let logger = RequestLogger::new(RunMode::Development);
        assert!(logger.should_log(200));
        assert!(logger.should_log(404));
    }
}
