//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration (every problem reported, then exit)
//! - Open the database
//! - Optionally apply pending migrations before traffic is accepted
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;

use crate::config::{validate_config, GatewayConfig, ValidationError};
use crate::database::Database;
use crate::migrations::{MigrationError, MigrationRegistry, MigrationRunner};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration invalid ({} problem(s))", .0.len())]
    InvalidConfig(Vec<ValidationError>),

    #[error("cannot open database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("startup migrations failed: {0}")]
    Migration(#[from] MigrationError),
}

/// Check the environment-derived configuration, logging each problem.
pub fn validate_environment(config: &GatewayConfig) -> Result<(), StartupError> {
    match validate_config(config) {
        Ok(()) => {
            if config.mode.is_production() {
                tracing::info!("Production environment validated");
            } else {
                tracing::warn!("Development mode: origin, logging and admin IP checks relaxed");
            }
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                tracing::error!(%error, "Configuration error");
            }
            Err(StartupError::InvalidConfig(errors))
        }
    }
}

/// Validate, open the database and run startup migrations if enabled.
pub fn bootstrap(config: &GatewayConfig) -> Result<Arc<Database>, StartupError> {
    validate_environment(config)?;

    let database = Arc::new(Database::open(&config.database.url)?);

    if config.migrations.run_on_startup {
        let registry = MigrationRegistry::new(config.migrations.directory.clone())
            .lenient(config.migrations.lenient_filenames);
        let report = MigrationRunner::new(registry, database.clone()).run()?;
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Startup migrations complete"
        );
    }

    Ok(database)
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
        config.migrations.directory = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations").into();
        config
    }

    #[test]
    fn missing_values_block_startup() {
        let mut config = config();
        config.mode = RunMode::Production;
        match bootstrap(&config) {
            Err(StartupError::InvalidConfig(errors)) => {
                assert_eq!(errors, vec![ValidationError::Missing("ENCRYPTION_MASTER_KEY")]);
            }
            other => panic!("expected invalid config, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn startup_migrations_build_the_schema() {
        let mut config = config();
        config.migrations.run_on_startup = true;
        let database = bootstrap(&config).unwrap();

        let tables: i64 = database
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'accounts', 'transactions', 'cards', '_migrations')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }
}
