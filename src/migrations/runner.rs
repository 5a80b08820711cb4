//! Applies pending migrations and reports migration status.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use serde::Serialize;

use crate::database::Database;
use crate::migrations::error::MigrationError;
use crate::migrations::ledger::{Ledger, LedgerEntry};
use crate::migrations::registry::MigrationRegistry;
use crate::observability::metrics;

/// Outcome of a successful [`MigrationRunner::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Ids applied by this run, in order.
    pub applied: Vec<String>,
    /// Ids found already recorded by a concurrent runner.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    Applied {
        applied_at: DateTime<Utc>,
        /// False when the file changed after it was applied. None when the
        /// ledger row carries no checksum.
        checksum_matches: Option<bool>,
    },
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub id: String,
    pub filename: String,
    #[serde(flatten)]
    pub state: MigrationState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub migrations: Vec<MigrationStatus>,
    pub total: usize,
    pub applied: usize,
    pub pending: usize,
    /// Ledger rows whose file no longer exists.
    pub orphaned: Vec<LedgerEntry>,
}

/// Reconciles a [`MigrationRegistry`] with the ledger in a [`Database`].
pub struct MigrationRunner {
    registry: MigrationRegistry,
    database: Arc<Database>,
}

impl MigrationRunner {
    pub fn new(registry: MigrationRegistry, database: Arc<Database>) -> Self {
        Self { registry, database }
    }

    /// Apply every pending migration in filename order.
    ///
    /// Each migration's SQL and its ledger row commit together. The first
    /// failure stops the run; nothing after it is attempted.
    pub fn run(&self) -> Result<RunReport, MigrationError> {
        let mut conn = self.database.lock();

        Ledger::new(&conn).ensure_table()?;
        let migrations = self.registry.list_migrations()?;
        let applied: HashSet<String> = Ledger::new(&conn)
            .list_applied()?
            .into_iter()
            .map(|entry| entry.id)
            .collect();

        let pending: Vec<_> = migrations
            .into_iter()
            .filter(|m| !applied.contains(&m.id))
            .collect();

        if pending.is_empty() {
            tracing::info!("No pending migrations");
            return Ok(RunReport::default());
        }
        tracing::info!(count = pending.len(), "Applying pending migrations");

        let mut report = RunReport::default();
        for migration in pending {
            let started = Instant::now();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let ledger = Ledger::new(&tx);

            // Another runner may have committed it since the ledger was read.
            if ledger.contains(&migration.id)? {
                tracing::warn!(id = %migration.id, "Migration already recorded, skipping");
                report.skipped.push(migration.id);
                continue;
            }

            tx.execute_batch(&migration.content)
                .map_err(|source| MigrationError::Execution {
                    filename: migration.filename.clone(),
                    source,
                })?;

            match ledger.record_applied(&migration) {
                Ok(()) => {}
                Err(MigrationError::Duplicate(id)) => {
                    tracing::warn!(id = %id, "Migration already recorded, skipping");
                    report.skipped.push(id);
                    continue;
                }
                Err(e) => return Err(e),
            }
            tx.commit()?;

            tracing::info!(
                id = %migration.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Applied migration"
            );
            metrics::record_migration_applied(&migration.id);
            report.applied.push(migration.id);
        }

        Ok(report)
    }

    /// Report applied and pending migrations without writing anything.
    pub fn status(&self) -> Result<StatusReport, MigrationError> {
        let conn = self.database.lock();
        let migrations = self.registry.list_migrations()?;

        let ledger_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_migrations')",
            [],
            |row| row.get(0),
        )?;
        let entries = if ledger_exists {
            Ledger::new(&conn).list_applied()?
        } else {
            Vec::new()
        };

        let known: HashSet<&str> = migrations.iter().map(|m| m.id.as_str()).collect();
        let orphaned: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| !known.contains(e.id.as_str()))
            .cloned()
            .collect();
        let by_id: HashMap<&str, &LedgerEntry> =
            entries.iter().map(|e| (e.id.as_str(), e)).collect();

        let statuses: Vec<MigrationStatus> = migrations
            .iter()
            .map(|m| {
                let state = match by_id.get(m.id.as_str()) {
                    Some(entry) => MigrationState::Applied {
                        applied_at: entry.applied_at,
                        checksum_matches: entry.checksum.as_ref().map(|c| *c == m.checksum),
                    },
                    None => MigrationState::Pending,
                };
                MigrationStatus {
                    id: m.id.clone(),
                    filename: m.filename.clone(),
                    state,
                }
            })
            .collect();

        let applied = statuses
            .iter()
            .filter(|s| matches!(s.state, MigrationState::Applied { .. }))
            .count();

        Ok(StatusReport {
            total: statuses.len(),
            applied,
            pending: statuses.len() - applied,
            migrations: statuses,
            orphaned,
        })
    }
}
