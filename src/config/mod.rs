//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env + gateway.toml (optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (required values, semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to the pipeline and handlers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, load_from_environment, ConfigError};
pub use schema::{
    DatabaseConfig, GatewayConfig, MigrationConfig, RateLimitConfig, RateLimitPolicyConfig,
    RunMode, SecurityConfig,
};
pub use validation::{validate_config, ValidationError};
