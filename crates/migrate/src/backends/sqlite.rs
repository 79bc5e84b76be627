//! SQLite Backend Implementation
//!
//! Embedded backend built on sqlx's SQLite driver. Used for file databases and
//! for in-memory databases in tests.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Pool, Row as SqlxRow, Sqlite};

use super::core::*;
use crate::error::{MigrateError, MigrateResult};

/// SQLite database backend implementation
#[derive(Debug, Default)]
pub struct SqliteBackend;

impl SqliteBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn create_pool(&self, database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>> {
        self.validate_database_url(database_url)?;

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| MigrateError::Connection(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true);

        let sqlx_pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to create SQLite pool: {}", e)))?;

        Ok(Arc::new(SqlitePool::new(sqlx_pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    fn validate_database_url(&self, url: &str) -> MigrateResult<()> {
        if !url.starts_with("sqlite:") {
            return Err(MigrateError::Connection("Invalid SQLite URL scheme".to_string()));
        }
        Ok(())
    }
}

/// SQLite connection pool implementation
pub struct SqlitePool {
    pool: Pool<Sqlite>,
}

impl SqlitePool {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Failed to start transaction: {}", e)))?;

        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::Query(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<Box<dyn DatabaseRow>>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| Box::new(SqliteDbRow { row }) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(|row| Box::new(SqliteDbRow { row }) as Box<dyn DatabaseRow>))
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute_script(&mut self, script: &str) -> MigrateResult<()> {
        (&mut *self.tx)
            .execute(script)
            .await
            .map_err(|e| MigrateError::Query(e.to_string()))?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| MigrateError::Query(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| MigrateError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(|r| Box::new(SqliteDbRow { row: r }) as Box<dyn DatabaseRow>))
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

/// SQLite row implementation
pub struct SqliteDbRow {
    row: SqliteRow,
}

impl DatabaseRow for SqliteDbRow {
    fn get_i64(&self, column: &str) -> MigrateResult<i64> {
        self.row.try_get(column).map_err(|e| column_error(column, e))
    }

    fn get_string(&self, column: &str) -> MigrateResult<String> {
        self.row.try_get(column).map_err(|e| column_error(column, e))
    }

    fn get_datetime(&self, column: &str) -> MigrateResult<DateTime<Utc>> {
        self.row.try_get(column).map_err(|e| column_error(column, e))
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[DatabaseValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::String(s) => query.bind(s.clone()),
            DatabaseValue::DateTime(dt) => query.bind(*dt),
        };
    }
    query
}
