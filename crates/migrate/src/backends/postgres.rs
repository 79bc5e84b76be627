//! PostgreSQL Backend Implementation
//!
//! This module provides the PostgreSQL-specific implementation of the database
//! backend traits using sqlx as the underlying database driver.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Executor, Pool, Postgres, Row as SqlxRow};

use super::core::*;
use crate::error::{MigrateError, MigrateResult};

/// PostgreSQL database backend implementation
#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    /// Create a new PostgreSQL backend instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn create_pool(&self, database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>> {
        self.validate_database_url(database_url)?;

        let sqlx_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .connect(database_url)
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Arc::new(PostgresPool::new(sqlx_pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn validate_database_url(&self, url: &str) -> MigrateResult<()> {
        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
            return Err(MigrateError::Connection("Invalid PostgreSQL URL scheme".to_string()));
        }
        url::Url::parse(url).map_err(|e| MigrateError::Connection(format!("Invalid database URL: {}", e)))?;
        Ok(())
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Pool<Postgres>,
}

impl PostgresPool {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::Transaction(format!("Failed to start transaction: {}", e)))?;

        Ok(Box::new(PostgresTransaction::new(tx)))
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
            .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(|r| Box::new(PostgresRow::new(r)) as Box<dyn DatabaseRow>))
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
    async fn execute_script(&mut self, script: &str) -> MigrateResult<()> {
        // A bare &str carries no arguments, so sqlx sends it over the simple
        // query protocol and multi-statement batches are accepted.
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

        Ok(row.map(|r| Box::new(PostgresRow::new(r)) as Box<dyn DatabaseRow>))
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

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    pub fn new(row: PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
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
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = bind_database_value(query, param);
    }
    query
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
    }
}
