//! Core Database Backend Traits
//!
//! This module defines the traits the migration engine talks to. They cover
//! exactly what a run needs: parameterised ledger queries on the pool, and
//! transactions that can execute an opaque script batch, write the ledger,
//! then commit or roll back as one unit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{MigrateError, MigrateResult};

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Begin a transaction on a connection checked out from the pool
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>>;

    /// Execute a query directly on the pool and return affected rows count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    /// Execute a query and return result rows directly on the pool
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row directly on the pool
    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>>;

    /// Close the pool
    async fn close(&self);

    /// Get the SQL dialect spoken by this pool
    fn sql_dialect(&self) -> SqlDialect;
}

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a raw script without preparing it; the script may hold several statements
    async fn execute_script(&mut self, script: &str) -> MigrateResult<()>;

    /// Execute a parameterised query within the transaction
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    /// Execute a query within the transaction and return the first result row
    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// Abstract database row trait with typed column access
pub trait DatabaseRow: Send {
    fn get_i64(&self, column: &str) -> MigrateResult<i64>;

    fn get_string(&self, column: &str) -> MigrateResult<String>;

    fn get_datetime(&self, column: &str) -> MigrateResult<DateTime<Utc>>;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Int64(i64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Auto-incrementing primary key column definition
    pub fn auto_increment_primary_key(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "BIGSERIAL PRIMARY KEY",
            SqlDialect::SQLite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Column type holding a UTC timestamp
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "TIMESTAMPTZ",
            SqlDialect::SQLite => "TEXT",
        }
    }

    /// Database clock expression for a UTC timestamp. SQLite gets RFC 3339
    /// text with milliseconds so stored values sort chronologically.
    pub fn current_timestamp(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "now()",
            SqlDialect::SQLite => "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        }
    }

    /// Query returning a row iff a table named by the first parameter exists
    pub fn table_exists_sql(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => {
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name::text = $1"
            }
            SqlDialect::SQLite => "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = $1",
        }
    }
}

/// Database backend trait that provides database-specific implementations
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Create a connection pool from a database URL
    async fn create_pool(&self, database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>>;

    /// Get the SQL dialect used by this backend
    fn sql_dialect(&self) -> SqlDialect;

    /// Validate a database URL for this backend
    fn validate_database_url(&self, url: &str) -> MigrateResult<()>;
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

impl DatabasePoolConfig {
    /// One long-lived connection. In-memory SQLite databases live exactly as
    /// long as their connection, so they need this.
    pub fn single_connection() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: None,
            max_lifetime_seconds: None,
        }
    }

    pub(crate) fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub(crate) fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_seconds.map(Duration::from_secs)
    }

    pub(crate) fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_seconds.map(Duration::from_secs)
    }
}

/// Map a driver error raised while reading a column
pub(crate) fn column_error(column: &str, err: impl std::fmt::Display) -> MigrateError {
    MigrateError::Query(format!("Failed to read column '{}': {}", column, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_value_conversions() {
        assert_eq!(DatabaseValue::from(42i64), DatabaseValue::Int64(42));
        assert_eq!(DatabaseValue::from("alice"), DatabaseValue::String("alice".into()));
    }

    #[test]
    fn test_dialect_fragments() {
        assert!(SqlDialect::PostgreSQL
            .table_exists_sql()
            .contains("information_schema.tables"));
        assert!(SqlDialect::SQLite.table_exists_sql().contains("sqlite_master"));
        assert_eq!(SqlDialect::SQLite.timestamp_type(), "TEXT");
        assert!(SqlDialect::SQLite.current_timestamp().starts_with("strftime("));
    }

    #[test]
    fn test_single_connection_pool_never_expires() {
        let config = DatabasePoolConfig::single_connection();
        assert_eq!(config.max_connections, 1);
        assert!(config.idle_timeout().is_none());
        assert!(config.max_lifetime().is_none());
    }
}
