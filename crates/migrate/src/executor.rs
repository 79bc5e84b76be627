//! Migration Executor - one migration, one transaction
//!
//! Applying runs the forward script and records the ledger entry; rolling back
//! runs the stored rollback script and removes the entry. Either both halves
//! commit or the transaction is rolled back and nothing is left behind.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::catalog::Migration;
use crate::changelog::{ChangelogEntry, ChangelogStore};
use crate::definitions::MigrationDirection;
use crate::error::{MigrateError, MigrateResult};

/// Runs single migrations against the database
#[derive(Debug, Clone)]
pub struct MigrationExecutor {
    changelog: ChangelogStore,
}

impl MigrationExecutor {
    pub fn new(changelog: ChangelogStore) -> Self {
        Self { changelog }
    }

    fn pool(&self) -> &Arc<dyn DatabasePool> {
        self.changelog.pool()
    }

    /// Apply `migration` and record it, returning the recorded entry
    pub async fn apply_migration(&self, migration: &Migration) -> MigrateResult<ChangelogEntry> {
        let mut tx = self.pool().begin_transaction().await?;

        let outcome: MigrateResult<ChangelogEntry> = async {
            run_script(tx.as_mut(), migration.version, MigrationDirection::Up, &migration.forward_script).await?;
            self.changelog.record(tx.as_mut(), migration).await
        }
        .await;

        finish(tx, outcome, migration.version).await
    }

    /// Undo `entry` with its stored rollback script and drop it from the ledger
    pub async fn rollback_entry(&self, entry: &ChangelogEntry) -> MigrateResult<()> {
        let mut tx = self.pool().begin_transaction().await?;

        let outcome: MigrateResult<()> = async {
            run_script(tx.as_mut(), entry.version, MigrationDirection::Down, &entry.rollback_script).await?;
            self.changelog.delete(tx.as_mut(), entry.version).await
        }
        .await;

        finish(tx, outcome, entry.version).await
    }
}

async fn run_script(
    tx: &mut dyn DatabaseTransaction,
    version: i64,
    direction: MigrationDirection,
    script: &str,
) -> MigrateResult<()> {
    if script.trim().is_empty() {
        debug!("Migration v{} has an empty {} script", version, direction);
        return Ok(());
    }

    tx.execute_script(script)
        .await
        .map_err(|e| MigrateError::execution(version, direction, script_error_message(e)))
}

/// Commit on success; otherwise roll back and hand back the original error
async fn finish<T>(
    tx: Box<dyn DatabaseTransaction>,
    outcome: MigrateResult<T>,
    version: i64,
) -> MigrateResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Failed to roll back transaction for v{}: {}", version, rollback_err);
            }
            Err(err)
        }
    }
}

fn script_error_message(err: MigrateError) -> String {
    match err {
        MigrateError::Query(message) => message,
        other => other.to_string(),
    }
}
