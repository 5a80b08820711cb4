//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Root configuration for the banking gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Execution mode (development relaxes origin, logging and admin checks).
    pub mode: RunMode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Database location and credentials.
    pub database: DatabaseConfig,

    /// Security pipeline settings.
    pub security: SecurityConfig,

    /// Rate limiting policies.
    pub rate_limit: RateLimitConfig,

    /// Migration runner settings.
    pub migrations: MigrationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route handler settings.
    pub api: ApiConfig,
}

/// Execution mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn is_production(self) -> bool {
        self == RunMode::Production
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Development => write!(f, "development"),
            RunMode::Production => write!(f, "production"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(RunMode::Development),
            "production" | "prod" => Ok(RunMode::Production),
            other => Err(format!("unknown run mode '{other}'")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Database connection settings.
///
/// `url` is a SQLite path (optionally prefixed with `sqlite://`) or `:memory:`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
}

impl DatabaseConfig {
    /// Names of the credential variables that are not set.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.trim().is_empty() {
            missing.push("DATABASE_URL");
        }
        if is_blank(&self.anon_key) {
            missing.push("DATABASE_ANON_KEY");
        }
        if is_blank(&self.service_role_key) {
            missing.push("DATABASE_SERVICE_ROLE_KEY");
        }
        missing
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Origins admitted by the cross-origin policy outside development mode.
    pub allowed_origins: Vec<String>,

    /// Path prefixes treated as administrative.
    pub admin_path_prefixes: Vec<String>,

    /// Caller IPs admitted on admin paths in production.
    pub admin_allowed_ips: Vec<String>,

    /// Path fragments that accept `multipart/form-data` uploads.
    pub upload_path_markers: Vec<String>,

    /// Path fragments that receive the extra anti-sniffing/anti-framing headers.
    pub sensitive_path_markers: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Master key for field encryption; required in production.
    pub encryption_master_key: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://your-domain.com".to_string(),
                "https://www.your-domain.com".to_string(),
                "https://app.your-domain.com".to_string(),
            ],
            admin_path_prefixes: vec!["/api/admin".to_string()],
            admin_allowed_ips: Vec::new(),
            upload_path_markers: vec![
                "/upload".to_string(),
                "/kyc".to_string(),
                "/mobile-deposit".to_string(),
            ],
            sensitive_path_markers: vec!["/admin".to_string(), "/api/auth".to_string()],
            max_body_size: 10 * 1024 * 1024, // 10MB
            encryption_master_key: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Independent policies; a request must pass every policy that applies to it.
    pub policies: Vec<RateLimitPolicyConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policies: vec![
                RateLimitPolicyConfig::new("general", &[], 100, 15 * 60),
                RateLimitPolicyConfig::new("auth", &["/api/auth/", "/api/admin/"], 5, 15 * 60),
                RateLimitPolicyConfig::new("api", &["/api/"], 60, 60),
                RateLimitPolicyConfig::new(
                    "upload",
                    &["/api/kyc/upload", "/api/mobile-deposit", "/api/upload"],
                    10,
                    60 * 60,
                ),
            ],
        }
    }
}

/// A single fixed-window policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitPolicyConfig {
    /// Policy name for logging/metrics.
    pub name: String,

    /// Path prefixes this policy applies to. Empty = every request.
    #[serde(default)]
    pub path_prefixes: Vec<String>,

    /// Maximum requests per window per client.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitPolicyConfig {
    pub fn new(name: &str, prefixes: &[&str], max_requests: u32, window_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            path_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            max_requests,
            window_secs,
        }
    }
}

/// Migration runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory holding `<YYYYMMDDHHMMSS><description>.sql` files.
    pub directory: PathBuf,

    /// Accept files without a timestamp prefix (timestamp falls back to now).
    pub lenient_filenames: bool,

    /// Apply pending migrations when the server starts.
    pub run_on_startup: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("migrations"),
            lenient_filenames: false,
            run_on_startup: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Route handler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Message returned by `GET /api/ping`.
    pub ping_message: String,

    /// Default page size for transaction listings.
    pub default_transaction_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            ping_message: "ping".to_string(),
            default_transaction_limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policies_match_documented_limits() {
        let config = RateLimitConfig::default();
        let limits: Vec<_> = config
            .policies
            .iter()
            .map(|p| (p.name.as_str(), p.max_requests, p.window_secs))
            .collect();
        assert_eq!(
            limits,
            vec![
                ("general", 100, 900),
                ("auth", 5, 900),
                ("api", 60, 60),
                ("upload", 10, 3600),
            ]
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            mode = "production"

            [database]
            url = "bank.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, RunMode::Production);
        assert_eq!(config.database.url, "bank.db");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.rate_limit.policies.len(), 4);
    }

    #[test]
    fn missing_credentials_lists_each_blank_value() {
        let mut db = DatabaseConfig::default();
        assert_eq!(
            db.missing_credentials(),
            vec!["DATABASE_URL", "DATABASE_ANON_KEY", "DATABASE_SERVICE_ROLE_KEY"]
        );

        db.url = "bank.db".into();
        db.anon_key = Some("anon".into());
        db.service_role_key = Some("  ".into());
        assert_eq!(db.missing_credentials(), vec!["DATABASE_SERVICE_ROLE_KEY"]);
    }

    #[test]
    fn run_mode_parses_short_names() {
        assert_eq!("prod".parse::<RunMode>().unwrap(), RunMode::Production);
        assert_eq!("Development".parse::<RunMode>().unwrap(), RunMode::Development);
        assert!("staging".parse::<RunMode>().is_err());
    }
}
