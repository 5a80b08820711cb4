//! Migration error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migrations directory (or a file in it) could not be read.
    #[error("cannot read migrations at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file does not follow `<YYYYMMDDHHMMSS><description>.sql`.
    #[error("migration file '{filename}' has no valid 14-digit timestamp prefix")]
    InvalidFilename { filename: String },

    /// Two files map to the same migration id.
    #[error("migration id '{id}' is used by both '{first}' and '{second}'")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },

    /// The ledger already holds this id.
    #[error("migration '{0}' is already recorded in the ledger")]
    Duplicate(String),

    /// The migration's SQL failed; the migration was rolled back.
    #[error("migration '{filename}' failed: {source}")]
    Execution {
        filename: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("ledger error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl MigrationError {
    /// Filename of the migration that failed, if the error is tied to one.
    pub fn filename(&self) -> Option<&str> {
        match self {
            MigrationError::InvalidFilename { filename }
            | MigrationError::Execution { filename, .. }
            | MigrationError::DuplicateId {
                second: filename, ..
            } => Some(filename),
            _ => None,
        }
    }
}
