//! # elif-migrate: Versioned SQL migrations for elif.rs
//!
//! A catalog of versioned migrations, each a forward script and a reverse
//! script, applied against PostgreSQL or SQLite. Every applied migration is
//! recorded in a changelog table together with its rollback script, so the
//! database can always be walked back even after the migration source is gone.
//!
//! ```no_run
//! use elif_migrate::{connect, Catalog, DatabasePoolConfig, Migrator};
//!
//! # async fn run() -> elif_migrate::MigrateResult<()> {
//! let mut catalog = Catalog::new();
//! catalog.register(
//!     20230101000000,
//!     "Jane Doe <jane@example.com>",
//!     "create_users",
//!     "CREATE TABLE users (id BIGINT PRIMARY KEY, name TEXT NOT NULL)",
//!     "DROP TABLE users",
//! );
//!
//! let pool = connect("sqlite://app.db", DatabasePoolConfig::default()).await?;
//! let result = Migrator::new(&catalog, pool).up().await?;
//! println!("applied {} migration(s)", result.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod catalog;
pub mod changelog;
pub mod config;
pub mod definitions;
pub mod error;
pub mod executor;
pub mod manager;
pub mod migrator;

// Re-export the engine surface
pub use backends::{connect, DatabaseBackendType, DatabasePool, DatabasePoolConfig, SqlDialect};
pub use catalog::{Catalog, Migration};
pub use changelog::{ChangelogEntry, ChangelogStore, DEFAULT_CHANGELOG_TABLE};
pub use config::MigrateConfig;
pub use definitions::*;
pub use error::{MigrateError, MigrateResult};
pub use executor::MigrationExecutor;
pub use manager::MigrationManager;
pub use migrator::Migrator;
