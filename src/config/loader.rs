//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::ValidationError;

/// Default config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "gateway.toml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid environment value {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Load configuration the way both binaries do: `.env`, then the TOML file
/// named by `GATEWAY_CONFIG` (or `gateway.toml` if it exists), then
/// environment overrides.
pub fn load_from_environment() -> Result<GatewayConfig, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let mut config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) => load_config(Path::new(&path))?,
        Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        Err(_) => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    Ok(config)
}

/// Overlay environment values onto a loaded configuration.
///
/// `lookup` abstracts the environment so tests don't touch process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(mode) = get("APP_ENV") {
        config.mode = mode.parse().map_err(|reason| ConfigError::Env {
            var: "APP_ENV",
            reason,
        })?;
    }
    if let Some(url) = get("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(key) = get("DATABASE_ANON_KEY") {
        config.database.anon_key = Some(key);
    }
    if let Some(key) = get("DATABASE_SERVICE_ROLE_KEY") {
        config.database.service_role_key = Some(key);
    }
    if let Some(key) = get("ENCRYPTION_MASTER_KEY") {
        config.security.encryption_master_key = Some(key);
    }
    if let Some(ips) = get("ADMIN_ALLOWED_IPS") {
        config.security.admin_allowed_ips = split_list(&ips);
    }
    if let Some(origins) = get("ALLOWED_ORIGINS") {
        config.security.allowed_origins = split_list(&origins);
    }
    if let Some(addr) = get("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(dir) = get("MIGRATIONS_DIR") {
        config.migrations.directory = PathBuf::from(dir);
    }
    if let Some(message) = get("PING_MESSAGE") {
        config.api.ping_message = message;
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
