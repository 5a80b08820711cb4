//! Local datastore.
//!
//! # Data Flow
//! ```text
//! DATABASE_URL
//!     → Database::open (pragmas, single shared connection)
//!     → migrations::MigrationRunner (schema)
//!     → store::BankStore (banking reads/writes for route handlers)
//! ```
//!
//! # Design Decisions
//! - One SQLite connection behind a mutex; handlers run the short queries
//!   inline and never hold the lock across an await point
//! - The handle is created once and injected, never reached through a global
//! - Money is stored as integer cents

pub mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Connection;

pub use store::{Account, AccountSummary, AccountType, BankStore, Card, NewUser, Transaction, TransactionKind, User};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database named by a `DATABASE_URL` value.
    ///
    /// Accepts a plain path, a `sqlite://` or `sqlite:` URL, or `:memory:`.
    pub fn open(url: &str) -> Result<Self, rusqlite::Error> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        if path == ":memory:" {
            return Self::in_memory();
        }

        tracing::info!(path = %path, "Opening database");
        let conn = Connection::open(path)?;
        configure(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Exclusive access to the connection.
    ///
    /// A panic while the lock was held leaves SQLite itself consistent (open
    /// transactions roll back when dropped), so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Busy timeout first, so a second process opening the same file waits for
/// the journal mode switch instead of failing.
fn configure(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.execute("PRAGMA foreign_keys=ON", [])?;
    Ok(())
}

/// Format a timestamp the way every table stores it.
pub(crate) fn format_datetime(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Accepts RFC 3339 and SQLite's
/// `YYYY-MM-DD HH:MM:SS` default format.
pub(crate) fn parse_datetime(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or(DateTime::UNIX_EPOCH)
}
