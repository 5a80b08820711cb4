//! Fixed-window rate limiting.
//!
//! Several independent policies, each with its own counters keyed by client
//! IP. A request is counted against every policy whose path prefixes match
//! it, in configuration order, and is rejected by the first one over its
//! limit. Over-limit requests are refused, never queued.

use std::time::{Duration, Instant};

use axum::{
    http::{HeaderName, HeaderValue},
    response::Response,
};
use dashmap::DashMap;

use crate::config::{RateLimitConfig, RateLimitPolicyConfig};
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start: Instant,
    count: u32,
}

struct Policy {
    name: String,
    path_prefixes: Vec<String>,
    max_requests: u32,
    window: Duration,
    message: String,
    counters: DashMap<String, WindowCounter>,
}

impl Policy {
    fn from_config(config: &RateLimitPolicyConfig) -> Self {
        Self {
            name: config.name.clone(),
            path_prefixes: config.path_prefixes.clone(),
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            message: rejection_message(&config.name).to_string(),
            counters: DashMap::new(),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.path_prefixes.is_empty() || self.path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn elapsed(counter: &WindowCounter, now: Instant) -> Duration {
        now.saturating_duration_since(counter.window_start)
    }

    fn expired(&self, counter: &WindowCounter, now: Instant) -> bool {
        Self::elapsed(counter, now) >= self.window
    }

    fn reset_in(&self, counter: &WindowCounter, now: Instant) -> Duration {
        self.window.saturating_sub(Self::elapsed(counter, now))
    }
}

fn rejection_message(policy: &str) -> &'static str {
    match policy {
        "auth" => "Too many authentication attempts",
        "api" => "API rate limit exceeded, please slow down.",
        "upload" => "Upload limit exceeded, please try again later.",
        _ => "Too many requests, please try again later.",
    }
}

/// Remaining budget in the tightest window a request counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

/// Counters for all policies. Shared by the pipeline and the sweeper task.
pub struct RateLimiter {
    policies: Vec<Policy>,
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            policies: config.policies.iter().map(Policy::from_config).collect(),
        }
    }

    pub fn check(&self, path: &str, key: &str) -> Result<Option<RateLimitSnapshot>, GatewayError> {
        self.check_at(path, key, Instant::now())
    }

    /// Count one request for `key` on `path` at time `now`.
    ///
    /// Returns the snapshot of the applicable policy with the fewest
    /// requests left, or `None` when no policy applies.
    pub fn check_at(
        &self,
        path: &str,
        key: &str,
        now: Instant,
    ) -> Result<Option<RateLimitSnapshot>, GatewayError> {
        let mut tightest: Option<RateLimitSnapshot> = None;

        for policy in self.policies.iter().filter(|p| p.applies_to(path)) {
            // The entry guard holds the shard lock, so read-modify-write is
            // atomic per key.
            let mut counter = policy
                .counters
                .entry(key.to_string())
                .or_insert(WindowCounter {
                    window_start: now,
                    count: 0,
                });
            if policy.expired(&counter, now) {
                *counter = WindowCounter {
                    window_start: now,
                    count: 0,
                };
            }

            let reset_in = policy.reset_in(&counter, now);
            if counter.count >= policy.max_requests {
                let retry_after_secs = ceil_secs(reset_in).max(1);
                drop(counter);
                metrics::record_rate_limited(&policy.name);
                return Err(GatewayError::RateLimited {
                    policy: policy.name.clone(),
                    message: policy.message.clone(),
                    retry_after_secs,
                });
            }
            counter.count += 1;

            let snapshot = RateLimitSnapshot {
                limit: policy.max_requests,
                remaining: policy.max_requests - counter.count,
                reset_secs: ceil_secs(reset_in),
            };
            if tightest.map_or(true, |t| snapshot.remaining < t.remaining) {
                tightest = Some(snapshot);
            }
        }

        Ok(tightest)
    }

    /// Drop counters whose window has ended. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        self.policies
            .iter()
            .map(|policy| {
                let before = policy.counters.len();
                policy
                    .counters
                    .retain(|_, c| !policy.expired(c, now));
                before.saturating_sub(policy.counters.len())
            })
            .sum()
    }

    /// Number of live counters across all policies.
    pub fn tracked_keys(&self) -> usize {
        self.policies.iter().map(|p| p.counters.len()).sum()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

impl Stage for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        ctx.rate_limit = self.check(&ctx.path, &ctx.client_key())?;
        Ok(())
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        if let Some(snapshot) = ctx.rate_limit {
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(snapshot.limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(snapshot.remaining));
            headers.insert(X_RATELIMIT_RESET, HeaderValue::from(snapshot.reset_secs));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::from_config(&RateLimitConfig::default())
    }

    #[test]
    fn auth_policy_allows_five_then_rejects() {
        let limiter = limiter();
        let now = Instant::now();
        for i in 0..5 {
            let snapshot = limiter
                .check_at("/api/auth/login", "1.2.3.4", now)
                .unwrap()
                .unwrap();
            assert_eq!(snapshot.remaining, 4 - i);
        }

        match limiter.check_at("/api/auth/login", "1.2.3.4", now) {
            Err(GatewayError::RateLimited {
                policy,
                retry_after_secs,
                ..
            }) => {
                assert_eq!(policy, "auth");
                assert_eq!(retry_after_secs, 900);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter();
        let now = Instant::now();
        for _ in 0..5 {
            limiter.check_at("/api/admin/migrations", "1.1.1.1", now).unwrap();
        }
        assert!(limiter.check_at("/api/admin/migrations", "1.1.1.1", now).is_err());
        assert!(limiter.check_at("/api/admin/migrations", "2.2.2.2", now).is_ok());
    }

    #[test]
    fn window_rollover_resets_count() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.check_at("/api/auth/login", "ip", start).unwrap();
        }
        let almost = start + Duration::from_secs(899);
        match limiter.check_at("/api/auth/login", "ip", almost) {
            Err(GatewayError::RateLimited {
                retry_after_secs, ..
            }) => assert_eq!(retry_after_secs, 1),
            other => panic!("expected rate limit, got {other:?}"),
        }

        let later = start + Duration::from_secs(900);
        assert!(limiter.check_at("/api/auth/login", "ip", later).is_ok());
    }

    #[test]
    fn policies_apply_cumulatively() {
        let limiter = limiter();
        let now = Instant::now();

        // 60/min on /api/ binds before the general 100/15min
        for _ in 0..60 {
            limiter.check_at("/api/accounts/1", "ip", now).unwrap();
        }
        match limiter.check_at("/api/accounts/1", "ip", now) {
            Err(GatewayError::RateLimited { policy, .. }) => assert_eq!(policy, "api"),
            other => panic!("expected api limit, got {other:?}"),
        }

        // Non-API paths only see the general policy, which already counted 61
        let next_minute = now + Duration::from_secs(61);
        for _ in 0..39 {
            limiter.check_at("/", "ip", next_minute).unwrap();
        }
        match limiter.check_at("/", "ip", next_minute) {
            Err(GatewayError::RateLimited { policy, .. }) => assert_eq!(policy, "general"),
            other => panic!("expected general limit, got {other:?}"),
        }
    }

    #[test]
    fn snapshot_reports_tightest_policy() {
        let limiter = limiter();
        let snapshot = limiter.check("/api/mobile-deposit", "ip").unwrap().unwrap();
        // upload: 10/h is tighter than api 60/min and general 100/15min
        assert_eq!(snapshot.limit, 10);
        assert_eq!(snapshot.remaining, 9);
    }

    #[test]
    fn purge_drops_only_expired_windows() {
        let limiter = limiter();
        let now = Instant::now();
        limiter.check_at("/api/accounts/1", "ip", now).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);

        // api window (60s) is over, general (15min) is not
        assert_eq!(limiter.purge_expired(now + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let limiter = RateLimiter::from_config(&RateLimitConfig {
            enabled: true,
            policies: vec![RateLimitPolicyConfig::new("forever", &[], 1, u64::MAX)],
        });
        let now = Instant::now();
        assert!(limiter.check_at("/", "ip", now).is_ok());
        assert!(limiter.check_at("/", "ip", now).is_err());
        assert_eq!(limiter.purge_expired(now + Duration::from_secs(3600)), 0);
    }
}
