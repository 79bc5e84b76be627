//! Database Backend Abstractions
//!
//! The engine speaks to the database through the traits in [`core`]. Each
//! supported database provides a backend that builds a pool from a URL.

pub mod core;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

// Re-export core traits and types
pub use self::core::*;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

use crate::error::{MigrateError, MigrateResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect database backend type from URL
    pub fn from_url(url: &str) -> MigrateResult<Self> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseBackendType::SQLite)
        } else {
            Err(MigrateError::Connection(format!(
                "Unable to detect database backend from URL: {}",
                redact_url(url)
            )))
        }
    }

    /// Backend implementation for this type
    pub fn backend(&self) -> Box<dyn DatabaseBackend> {
        match self {
            DatabaseBackendType::PostgreSQL => Box::new(PostgresBackend::new()),
            DatabaseBackendType::SQLite => Box::new(SqliteBackend::new()),
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "sqlite" => Ok(DatabaseBackendType::SQLite),
            _ => Err(MigrateError::Connection(format!("Unsupported database backend: {}", s))),
        }
    }
}

/// Create a connection pool using the backend matching the URL scheme
pub async fn connect(database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>> {
    let backend_type = DatabaseBackendType::from_url(database_url)?;
    tracing::debug!("Connecting to {} database at {}", backend_type, redact_url(database_url));
    backend_type.backend().create_pool(database_url, config).await
}

/// Strip the password from a URL so it can be logged
pub fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            // set_password only fails for URLs that cannot carry credentials
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
