//! Changelog Store - the persisted ledger of applied migrations
//!
//! One row per applied migration, carrying the rollback script captured when
//! it was applied. Rows are ordered by their `created` timestamp, with the
//! auto-increment id breaking ties, and that order alone decides which entry
//! is the most recent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backends::{DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue, SqlDialect};
use crate::catalog::Migration;
use crate::error::{MigrateError, MigrateResult};

/// Default name of the changelog table
pub const DEFAULT_CHANGELOG_TABLE: &str = "db_changelog";

/// A row of the changelog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub version: i64,
    pub author: String,
    pub description: String,
    /// Copy of the migration's reverse script taken when it was applied
    pub rollback_script: String,
    pub applied_at: DateTime<Utc>,
}

impl ChangelogEntry {
    /// Build the entry recording `migration` as applied at `applied_at`
    pub fn for_migration(migration: &Migration, applied_at: DateTime<Utc>) -> Self {
        Self {
            version: migration.version,
            author: migration.author.clone(),
            description: migration.description.clone(),
            rollback_script: migration.reverse_script.clone(),
            applied_at,
        }
    }

    fn from_row(row: &dyn DatabaseRow) -> MigrateResult<Self> {
        Ok(Self {
            version: row.get_i64("version")?,
            author: row.get_string("author")?,
            description: row.get_string("description")?,
            rollback_script: row.get_string("rollback")?,
            applied_at: row.get_datetime("created")?,
        })
    }
}

/// Access to the changelog table
#[derive(Clone)]
pub struct ChangelogStore {
    pool: Arc<dyn DatabasePool>,
    table: String,
}

impl ChangelogStore {
    /// Create a store over the default `db_changelog` table
    pub fn new(pool: Arc<dyn DatabasePool>) -> Self {
        Self::with_table(pool, DEFAULT_CHANGELOG_TABLE)
    }

    /// Create a store over a custom table. The name is interpolated into SQL
    /// and must already be validated as a plain identifier.
    pub fn with_table(pool: Arc<dyn DatabasePool>, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    /// Create the changelog table if it does not exist yet. Safe to call on
    /// every run.
    pub async fn ensure_schema(&self) -> MigrateResult<()> {
        let dialect = self.pool.sql_dialect();
        let found = self
            .pool
            .fetch_optional(dialect.table_exists_sql(), &[DatabaseValue::from(self.table.as_str())])
            .await
            .map_err(|e| MigrateError::Schema(format!("Failed to check for table {}: {}", self.table, e)))?;

        if found.is_some() {
            return Ok(());
        }

        tracing::info!("Creating changelog table {}", self.table);
        self.pool
            .execute(&self.create_table_sql(dialect), &[])
            .await
            .map_err(|e| MigrateError::Schema(format!("Failed to create table {}: {}", self.table, e)))?;
        Ok(())
    }

    /// True iff the ledger holds an entry for `version`
    pub async fn exists(&self, version: i64) -> MigrateResult<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE version = $1 LIMIT 1", self.table);
        let row = self
            .pool
            .fetch_optional(&sql, &[DatabaseValue::from(version)])
            .await
            .map_err(|e| MigrateError::Query(format!("Failed to check migration status: {}", e)))?;

        Ok(row.is_some())
    }

    /// Every entry, oldest application first
    pub async fn all_entries_by_applied_time(&self) -> MigrateResult<Vec<ChangelogEntry>> {
        let sql = format!("{} ORDER BY created ASC, id ASC", self.select_sql());
        let rows = self
            .pool
            .fetch_all(&sql, &[])
            .await
            .map_err(|e| MigrateError::Query(format!("Failed to query applied migrations: {}", e)))?;

        rows.iter().map(|row| ChangelogEntry::from_row(row.as_ref())).collect()
    }

    /// The entry applied last, or `None` when the ledger is empty
    pub async fn most_recent_entry(&self) -> MigrateResult<Option<ChangelogEntry>> {
        let sql = format!("{} ORDER BY created DESC, id DESC LIMIT 1", self.select_sql());
        let row = self
            .pool
            .fetch_optional(&sql, &[])
            .await
            .map_err(|e| MigrateError::Query(format!("Failed to query latest migration: {}", e)))?;

        row.map(|row| ChangelogEntry::from_row(row.as_ref())).transpose()
    }

    /// Record `migration` as applied inside the caller's transaction. The
    /// timestamp comes from the database clock so entries written from
    /// different hosts still order by when they actually committed.
    pub async fn record(&self, tx: &mut dyn DatabaseTransaction, migration: &Migration) -> MigrateResult<ChangelogEntry> {
        let version = migration.version;
        let insert_sql = format!(
            "INSERT INTO {} (version, author, description, \"rollback\", created) VALUES ($1, $2, $3, $4, {})",
            self.table,
            self.pool.sql_dialect().current_timestamp()
        );
        let params = [
            DatabaseValue::from(version),
            DatabaseValue::from(migration.author.as_str()),
            DatabaseValue::from(migration.description.as_str()),
            DatabaseValue::from(migration.reverse_script.as_str()),
        ];

        tx.execute(&insert_sql, &params)
            .await
            .map_err(|e| MigrateError::ledger_write(version, format!("Failed to record migration: {}", e)))?;

        let select_sql = format!("SELECT created FROM {} WHERE version = $1", self.table);
        let row = tx
            .fetch_optional(&select_sql, &[DatabaseValue::from(version)])
            .await
            .map_err(|e| MigrateError::ledger_write(version, format!("Failed to read back migration record: {}", e)))?
            .ok_or_else(|| MigrateError::ledger_write(version, "recorded row is missing"))?;

        Ok(ChangelogEntry::for_migration(migration, row.get_datetime("created")?))
    }

    /// Record `entry` with its own `applied_at` inside the caller's transaction
    pub async fn insert(&self, tx: &mut dyn DatabaseTransaction, entry: &ChangelogEntry) -> MigrateResult<()> {
        let sql = format!(
            "INSERT INTO {} (version, author, description, \"rollback\", created) VALUES ($1, $2, $3, $4, $5)",
            self.table
        );
        let params = [
            DatabaseValue::from(entry.version),
            DatabaseValue::from(entry.author.as_str()),
            DatabaseValue::from(entry.description.as_str()),
            DatabaseValue::from(entry.rollback_script.as_str()),
            DatabaseValue::from(entry.applied_at),
        ];

        tx.execute(&sql, &params)
            .await
            .map_err(|e| MigrateError::ledger_write(entry.version, format!("Failed to record migration: {}", e)))?;
        Ok(())
    }

    /// Remove the entry for `version` inside the caller's transaction.
    /// Deleting nothing is an error: the entry vanished since it was read.
    pub async fn delete(&self, tx: &mut dyn DatabaseTransaction, version: i64) -> MigrateResult<()> {
        let sql = format!("DELETE FROM {} WHERE version = $1", self.table);
        let removed = tx
            .execute(&sql, &[DatabaseValue::from(version)])
            .await
            .map_err(|e| MigrateError::ledger_write(version, format!("Failed to remove migration record: {}", e)))?;

        if removed == 0 {
            return Err(MigrateError::ledger_write(version, "no changelog row to remove"));
        }
        Ok(())
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT version, author, description, \"rollback\", created FROM {}",
            self.table
        )
    }

    /// SQL to create the changelog table
    pub fn create_table_sql(&self, dialect: SqlDialect) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id          {},\n    \
                version     BIGINT NOT NULL,\n    \
                author      TEXT NOT NULL,\n    \
                description TEXT NOT NULL,\n    \
                \"rollback\"  TEXT NOT NULL,\n    \
                created     {} NOT NULL DEFAULT ({})\n\
            )",
            self.table,
            dialect.auto_increment_primary_key(),
            dialect.timestamp_type(),
            dialect.current_timestamp(),
        )
    }
}

impl std::fmt::Debug for ChangelogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangelogStore")
            .field("table", &self.table)
            .field("dialect", &self.pool.sql_dialect())
            .finish()
    }
}
