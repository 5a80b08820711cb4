//! Ordered security stages and the axum middleware that drives them.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::{
    access_control::AdminIpAllowList, cache_control::CacheControl, content_type::ContentTypeCheck,
    context::RequestContext, cors::OriginPolicy, error_detail::ErrorDetailPolicy,
    headers::SecurityHeaders, rate_limit::RateLimiter, request_log::RequestLogger,
    sanitize::Sanitizer, upstream::UpstreamPrecheck,
};

/// One step of the request pipeline.
///
/// `on_request` may mutate the context or end the request with an error.
/// `on_response` runs for every response, including rejections.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_request(&self, _ctx: &mut RequestContext) -> Result<(), GatewayError> {
        Ok(())
    }

    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// Shared stages, such as the rate limiter the server also sweeps.
impl<S: Stage + ?Sized> Stage for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        (**self).on_request(ctx)
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        (**self).on_response(ctx, response)
    }
}

pub struct SecurityPipeline {
    stages: Vec<Box<dyn Stage>>,
    max_body_size: usize,
}

impl SecurityPipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>, max_body_size: usize) -> Self {
        Self {
            stages,
            max_body_size,
        }
    }

    /// The standard stage order for a validated configuration.
    pub fn from_config(config: &GatewayConfig, limiter: Arc<RateLimiter>) -> Self {
        let mode = config.mode;
        let security = &config.security;

        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(SecurityHeaders),
            Box::new(OriginPolicy::new(mode, security.allowed_origins.clone())),
            Box::new(RequestLogger::new(mode)),
            Box::new(Sanitizer::new()),
            Box::new(ContentTypeCheck::new(security.upload_path_markers.clone())),
            Box::new(CacheControl::new(security.sensitive_path_markers.clone())),
            Box::new(UpstreamPrecheck::new(&config.database)),
        ];
        if config.rate_limit.enabled {
            stages.push(Box::new(limiter));
        }
        stages.push(Box::new(AdminIpAllowList::new(
            mode,
            security.admin_path_prefixes.clone(),
            &security.admin_allowed_ips,
        )));
        stages.push(Box::new(ErrorDetailPolicy::new(mode)));

        Self::new(stages, security.max_body_size)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run request stages in order. Stops at the first rejection, or after
    /// the stage that marks the request as a preflight.
    pub fn process_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        for stage in &self.stages {
            if let Err(err) = stage.on_request(ctx) {
                tracing::warn!(
                    stage = stage.name(),
                    request_id = %ctx.request_id,
                    client_ip = %ctx.client_key(),
                    path = %ctx.path,
                    reason = %err,
                    "Request rejected"
                );
                metrics::record_rejection(stage.name(), err.kind());
                return Err(err);
            }
            if ctx.preflight {
                break;
            }
        }
        Ok(())
    }

    pub fn finish_response(&self, ctx: &RequestContext, response: &mut Response) {
        for stage in &self.stages {
            stage.on_response(ctx, response);
        }
    }
}

/// Buffers the request, runs the pipeline, then the route handler.
pub async fn security_middleware(
    State(pipeline): State<Arc<SecurityPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let (mut ctx, outcome) = match axum::body::to_bytes(body, pipeline.max_body_size).await {
        Ok(bytes) => {
            let mut ctx = RequestContext::from_parts(&parts, bytes);
            let outcome = pipeline.process_request(&mut ctx);
            (ctx, outcome)
        }
        Err(_) => (
            RequestContext::from_parts(&parts, Default::default()),
            Err(GatewayError::PayloadTooLarge {
                limit: pipeline.max_body_size,
            }),
        ),
    };

    let mut response = match outcome {
        Err(err) => err.into_response(),
        Ok(()) if ctx.preflight => StatusCode::NO_CONTENT.into_response(),
        Ok(()) => next.run(ctx.take_request(parts)).await,
    };

    pipeline.finish_response(&ctx, &mut response);
    metrics::record_request(ctx.method.as_str(), response.status().as_u16(), ctx.started);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.database.url = ":memory:".into();
        config.database.anon_key = Some("anon".into());
        config.database.service_role_key = Some("service".into());
        config
    }

    #[test]
    fn stages_run_in_documented_order() {
        let config = config();
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let pipeline = SecurityPipeline::from_config(&config, limiter);
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "security_headers",
                "cors",
                "request_logging",
                "sanitize",
                "content_type",
                "cache_control",
                "upstream_precheck",
                "rate_limit",
                "admin_ip_allow_list",
                "error_detail",
            ]
        );
    }

    #[test]
    fn disabled_rate_limiting_drops_the_stage() {
        let mut config = config();
        config.mode = RunMode::Production;
        config.rate_limit.enabled = false;
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let pipeline = SecurityPipeline::from_config(&config, limiter);
        assert!(!pipeline.stage_names().contains(&"rate_limit"));
    }
}
