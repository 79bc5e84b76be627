//! Migrator - engine-level operations over a catalog and a changelog
//!
//! `up` applies every catalog migration missing from the ledger in version
//! order, `down` undoes the most recently applied entry, and `sync` rolls back
//! ledger entries whose migrations left the catalog before running `up`.
//! Each migration commits on its own, so a run that fails part way keeps
//! everything it committed before the failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::backends::DatabasePool;
use crate::catalog::Catalog;
use crate::changelog::{ChangelogEntry, ChangelogStore};
use crate::config::MigrateConfig;
use crate::definitions::{
    MigrationRunResult, MigrationStatus, MigrationStatusEntry, RollbackResult, SyncResult,
};
use crate::error::MigrateResult;
use crate::executor::MigrationExecutor;

/// Migration runner that executes a catalog against a database
#[derive(Debug)]
pub struct Migrator<'a> {
    catalog: &'a Catalog,
    changelog: ChangelogStore,
    executor: MigrationExecutor,
}

impl<'a> Migrator<'a> {
    /// Create a migrator using the default changelog table
    pub fn new(catalog: &'a Catalog, pool: Arc<dyn DatabasePool>) -> Self {
        Self::with_changelog(catalog, ChangelogStore::new(pool))
    }

    /// Create a migrator using the changelog table named in `config`
    pub fn with_config(catalog: &'a Catalog, pool: Arc<dyn DatabasePool>, config: &MigrateConfig) -> Self {
        Self::with_changelog(catalog, ChangelogStore::with_table(pool, config.changelog_table.clone()))
    }

    pub fn with_changelog(catalog: &'a Catalog, changelog: ChangelogStore) -> Self {
        Self {
            catalog,
            executor: MigrationExecutor::new(changelog.clone()),
            changelog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn changelog(&self) -> &ChangelogStore {
        &self.changelog
    }

    /// Apply all pending migrations in ascending version order, stopping at
    /// the first failure
    pub async fn up(&self) -> MigrateResult<MigrationRunResult> {
        self.changelog.ensure_schema().await?;
        self.apply_pending().await
    }

    /// Roll back the most recently applied migration, if any
    pub async fn down(&self) -> MigrateResult<RollbackResult> {
        let start_time = Instant::now();
        self.changelog.ensure_schema().await?;

        info!("Downgrading migration");
        let mut result = RollbackResult::default();
        match self.changelog.most_recent_entry().await? {
            Some(entry) => {
                self.rollback(&entry).await?;
                result.rolled_back.push(entry);
            }
            None => info!("No migrations found, nothing to roll back"),
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    /// Roll back orphaned entries, newest first, then apply pending migrations
    pub async fn sync(&self) -> MigrateResult<SyncResult> {
        let start_time = Instant::now();
        self.changelog.ensure_schema().await?;

        let orphans: Vec<ChangelogEntry> = self
            .changelog
            .all_entries_by_applied_time()
            .await?
            .into_iter()
            .filter(|entry| !self.catalog.contains(entry.version))
            .collect();

        if orphans.is_empty() {
            info!("Changelog matches the catalog, no orphaned migrations");
        } else {
            info!("Found {} orphaned migration(s) to roll back", orphans.len());
        }

        let mut rolled_back = RollbackResult::default();
        for entry in orphans.into_iter().rev() {
            self.rollback(&entry).await?;
            rolled_back.rolled_back.push(entry);
        }
        rolled_back.execution_time_ms = start_time.elapsed().as_millis();

        let applied = self.apply_pending().await?;

        Ok(SyncResult { rolled_back, applied })
    }

    /// Report every catalog migration as pending or applied, followed by
    /// ledger entries the catalog no longer knows about
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatusEntry>> {
        self.changelog.ensure_schema().await?;

        let entries = self.changelog.all_entries_by_applied_time().await?;
        let applied: HashMap<i64, &ChangelogEntry> = entries.iter().map(|e| (e.version, e)).collect();

        let mut report: Vec<MigrationStatusEntry> = self
            .catalog
            .iter()
            .map(|migration| MigrationStatusEntry {
                version: migration.version,
                author: migration.author.clone(),
                description: migration.description.clone(),
                status: match applied.get(&migration.version) {
                    Some(entry) => MigrationStatus::Applied {
                        applied_at: entry.applied_at,
                    },
                    None => MigrationStatus::Pending,
                },
            })
            .collect();

        report.extend(
            entries
                .iter()
                .filter(|entry| !self.catalog.contains(entry.version))
                .map(|entry| MigrationStatusEntry {
                    version: entry.version,
                    author: entry.author.clone(),
                    description: entry.description.clone(),
                    status: MigrationStatus::Orphaned {
                        applied_at: entry.applied_at,
                    },
                }),
        );

        Ok(report)
    }

    async fn apply_pending(&self) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let mut result = MigrationRunResult::default();

        for version in self.catalog.ordered_versions() {
            let Some(migration) = self.catalog.get(version) else {
                continue;
            };
            info!(
                "Executing migration v{} {} <{}>",
                migration.version, migration.description, migration.author
            );

            if self.changelog.exists(version).await? {
                info!("v{} OK (EXISTS)", version);
                result.skipped.push(version);
                continue;
            }

            self.executor.apply_migration(migration).await?;
            info!("v{} OK", version);
            result.applied.push(version);
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    async fn rollback(&self, entry: &ChangelogEntry) -> MigrateResult<()> {
        info!(
            "Rolling back migration v{} {} <{}>",
            entry.version, entry.description, entry.author
        );
        self.executor.rollback_entry(entry).await?;
        info!("v{} OK (rolled back)", entry.version);
        Ok(())
    }
}
