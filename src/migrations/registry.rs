//! Migration discovery.
//!
//! Reads `*.sql` files from a directory on every call. Files are ordered by
//! name, which is chronological because every name starts with a
//! `YYYYMMDDHHMMSS` timestamp.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use sha2::{Digest, Sha256};

use crate::migrations::error::MigrationError;

const TIMESTAMP_LEN: usize = 14;

/// A migration file discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Filename without the `.sql` extension. Unique within a registry.
    pub id: String,
    pub filename: String,
    /// Raw SQL.
    pub content: String,
    /// Derived from the filename prefix.
    pub timestamp: NaiveDateTime,
    /// Hex SHA-256 of `content`.
    pub checksum: String,
}

/// Lists the migrations available in a directory.
#[derive(Debug, Clone)]
pub struct MigrationRegistry {
    directory: PathBuf,
    lenient: bool,
}

impl MigrationRegistry {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            lenient: false,
        }
    }

    /// Accept filenames without a timestamp prefix, stamping them with the
    /// current time instead of failing.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// All migrations in filename order. Not cached.
    pub fn list_migrations(&self) -> Result<Vec<Migration>, MigrationError> {
        let fs_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| MigrationError::Filesystem { path, source }
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory).map_err(fs_error(&self.directory))? {
            let entry = entry.map_err(fs_error(&self.directory))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let filename = entry.file_name().into_string().map_err(|name| {
                MigrationError::InvalidFilename {
                    filename: name.to_string_lossy().into_owned(),
                }
            })?;
            files.push((filename, path));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut migrations = Vec::with_capacity(files.len());
        for (filename, path) in files {
            let content = fs::read_to_string(&path).map_err(fs_error(&path))?;
            let timestamp = match parse_timestamp(&filename) {
                Some(ts) => ts,
                None if self.lenient => {
                    tracing::warn!(
                        filename = %filename,
                        "Migration filename has no timestamp prefix, using current time"
                    );
                    Utc::now().naive_utc()
                }
                None => return Err(MigrationError::InvalidFilename { filename }),
            };

            migrations.push(Migration {
                id: migration_id(&filename).to_string(),
                checksum: checksum(&content),
                filename,
                content,
                timestamp,
            });
        }

        ensure_unique_ids(&migrations)?;
        Ok(migrations)
    }
}

fn ensure_unique_ids(migrations: &[Migration]) -> Result<(), MigrationError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for m in migrations {
        if let Some(first) = seen.insert(&m.id, &m.filename) {
            return Err(MigrationError::DuplicateId {
                id: m.id.clone(),
                first: first.to_string(),
                second: m.filename.clone(),
            });
        }
    }
    Ok(())
}

/// Filename minus exactly one trailing `.sql`.
fn migration_id(filename: &str) -> &str {
    filename.strip_suffix(".sql").unwrap_or(filename)
}

/// Parse the leading `YYYYMMDDHHMMSS` of a migration filename.
pub fn parse_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let prefix = filename.get(..TIMESTAMP_LEN)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(prefix, "%Y%m%d%H%M%S").ok()
}

/// Hex SHA-256 of a migration body.
pub fn checksum(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}
