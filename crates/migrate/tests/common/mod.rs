#![allow(dead_code)]

use std::sync::Arc;

use elif_migrate::backends::DatabaseValue;
use elif_migrate::{connect, Catalog, ChangelogStore, DatabasePool, DatabasePoolConfig};

/// Fresh in-memory SQLite database, alive for as long as the pool is
pub async fn memory_pool() -> Arc<dyn DatabasePool> {
    connect("sqlite::memory:", DatabasePoolConfig::single_connection())
        .await
        .expect("in-memory sqlite pool")
}

pub async fn object_exists(pool: &Arc<dyn DatabasePool>, kind: &str, name: &str) -> bool {
    pool.fetch_optional(
        "SELECT 1 FROM sqlite_master WHERE type = $1 AND name = $2",
        &[DatabaseValue::from(kind), DatabaseValue::from(name)],
    )
    .await
    .expect("sqlite_master query")
    .is_some()
}

pub async fn table_exists(pool: &Arc<dyn DatabasePool>, name: &str) -> bool {
    object_exists(pool, "table", name).await
}

/// Versions in the ledger, oldest application first
pub async fn ledger_versions(store: &ChangelogStore) -> Vec<i64> {
    store
        .all_entries_by_applied_time()
        .await
        .expect("ledger query")
        .into_iter()
        .map(|entry| entry.version)
        .collect()
}

/// Catalog where version `n` creates table `t<n>` and drops it again
pub fn table_catalog(versions: &[i64]) -> Catalog {
    let mut catalog = Catalog::new();
    for &version in versions {
        catalog.register(
            version,
            "tester",
            format!("create_t{}", version),
            format!("CREATE TABLE t{} (id INTEGER PRIMARY KEY)", version),
            format!("DROP TABLE t{}", version),
        );
    }
    catalog
}
