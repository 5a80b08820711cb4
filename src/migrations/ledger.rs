//! The `_migrations` table: which migrations have run, and when.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use serde::Serialize;

use crate::database::{format_datetime, parse_datetime};
use crate::migrations::error::MigrationError;
use crate::migrations::registry::Migration;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    checksum TEXT
)";

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub filename: String,
    pub applied_at: DateTime<Utc>,
    /// Absent for rows written before checksums were recorded.
    pub checksum: Option<String>,
}

/// Ledger accessor over a borrowed connection (or open transaction).
pub struct Ledger<'a> {
    conn: &'a Connection,
}

impl<'a> Ledger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create the ledger table if it does not exist.
    pub fn ensure_table(&self) -> Result<(), MigrationError> {
        self.conn.execute_batch(CREATE_TABLE)?;
        Ok(())
    }

    /// Applied migrations, oldest first.
    pub fn list_applied(&self) -> Result<Vec<LedgerEntry>, MigrationError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, applied_at, checksum FROM _migrations
             ORDER BY applied_at ASC, rowid ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    applied_at: parse_datetime(&row.get::<_, String>(2)?),
                    checksum: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn contains(&self, id: &str) -> Result<bool, MigrationError> {
        let found = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Insert exactly one row for `migration`.
    ///
    /// The primary key rejects a second row for the same id; that surfaces
    /// as [`MigrationError::Duplicate`].
    pub fn record_applied(&self, migration: &Migration) -> Result<(), MigrationError> {
        let result = self.conn.execute(
            "INSERT INTO _migrations (id, filename, applied_at, checksum) VALUES (?1, ?2, ?3, ?4)",
            params![
                migration.id,
                migration.filename,
                format_datetime(Utc::now()),
                migration.checksum
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(MigrationError::Duplicate(migration.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
