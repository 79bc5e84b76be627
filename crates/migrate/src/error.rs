//! Error types for the migration engine
//!
//! Every engine operation reports failures through [`MigrateError`]. Variants
//! follow the failure points of a run: reaching the database, verifying the
//! changelog table, executing a script, and writing the ledger.

use thiserror::Error;

use crate::definitions::MigrationDirection;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Pool creation, URL validation or connection checkout failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The changelog table could not be verified or created
    #[error("Schema error: {0}")]
    Schema(String),

    /// Reading the changelog failed
    #[error("Query error: {0}")]
    Query(String),

    /// A forward or reverse script failed; its transaction was rolled back
    #[error("Migration v{version} failed while running {direction}: {message}")]
    Execution {
        version: i64,
        direction: MigrationDirection,
        message: String,
    },

    /// Recording or removing a ledger row failed; the script was rolled back with it
    #[error("Changelog write for v{version} failed: {message}")]
    LedgerWrite { version: i64, message: String },

    /// Beginning or committing a transaction failed
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A migration source file or template request is malformed
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Configuration values are missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reading or writing migration files failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Create a new execution error for a script that failed
    pub fn execution(version: i64, direction: MigrationDirection, message: impl Into<String>) -> Self {
        Self::Execution {
            version,
            direction,
            message: message.into(),
        }
    }

    /// Create a new ledger write error
    pub fn ledger_write(version: i64, message: impl Into<String>) -> Self {
        Self::LedgerWrite {
            version,
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Version of the migration this error is tied to, if any
    pub fn version(&self) -> Option<i64> {
        match self {
            Self::Execution { version, .. } | Self::LedgerWrite { version, .. } => Some(*version),
            _ => None,
        }
    }
}
