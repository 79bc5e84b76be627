//! Migration Definitions - Result and status types shared by the engine
//!
//! Defines the direction of a script run and the structured results returned
//! by the `up`, `down`, `sync` and `status` operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::changelog::ChangelogEntry;

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply the migration (run the forward script)
    Up,
    /// Rollback the migration (run the stored rollback script)
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Result of applying pending migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationRunResult {
    /// Versions applied by this run, in application order
    pub applied: Vec<i64>,
    /// Versions skipped because the ledger already had them
    pub skipped: Vec<i64>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Result of rolling back changelog entries
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackResult {
    /// Entries removed from the ledger, in the order they were rolled back
    pub rolled_back: Vec<ChangelogEntry>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RollbackResult {
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back.len()
    }

    /// True when there was nothing to roll back
    pub fn is_noop(&self) -> bool {
        self.rolled_back.is_empty()
    }

    pub fn rolled_back_versions(&self) -> Vec<i64> {
        self.rolled_back.iter().map(|e| e.version).collect()
    }
}

/// Result of reconciling the ledger with the catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    /// Orphaned entries rolled back, most recently applied first
    pub rolled_back: RollbackResult,
    /// Catalog migrations applied after the orphans were removed
    pub applied: MigrationRunResult,
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Registered in the catalog, not yet applied
    Pending,
    /// Registered in the catalog and recorded in the ledger
    Applied { applied_at: DateTime<Utc> },
    /// Recorded in the ledger but no longer registered in the catalog
    Orphaned { applied_at: DateTime<Utc> },
}

/// One line of a status report
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusEntry {
    pub version: i64,
    pub author: String,
    pub description: String,
    #[serde(flatten)]
    pub status: MigrationStatus,
}
