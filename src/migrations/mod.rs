//! Schema migrations.
//!
//! # Data Flow
//! ```text
//! migrations/*.sql
//!     → registry.rs (discover, order by filename, checksum)
//!     → runner.rs (diff against the ledger, apply pending)
//!     → ledger.rs (_migrations table, one row per applied file)
//! ```
//!
//! # Design Decisions
//! - Files are applied strictly in filename order, one at a time
//! - A migration's SQL and its ledger row commit in the same transaction
//! - The ledger's primary key is the only guard against double application
//!   by concurrent runners; the loser skips
//! - Filenames without a timestamp prefix are rejected unless the registry
//!   is put in lenient mode

pub mod error;
pub mod ledger;
pub mod registry;
pub mod runner;

pub use error::MigrationError;
pub use ledger::{Ledger, LedgerEntry};
pub use registry::{Migration, MigrationRegistry};
pub use runner::{MigrationRunner, MigrationState, MigrationStatus, RunReport, StatusReport};
