mod common;

use chrono::{TimeZone, Utc};
use elif_migrate::{
    Catalog, ChangelogEntry, MigrateConfig, MigrateError, MigrationDirection, MigrationStatus, Migrator,
};

use common::{ledger_versions, memory_pool, object_exists, table_catalog, table_exists};

const CREATE_USERS: i64 = 20230101000000;
const ADD_INDEX: i64 = 20230102000000;

fn users_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .register(
            ADD_INDEX,
            "Jane Doe <jane@example.com>",
            "add_index",
            "CREATE INDEX users_name_idx ON users (name)",
            "DROP INDEX users_name_idx",
        )
        .register(
            CREATE_USERS,
            "Jane Doe <jane@example.com>",
            "create_users",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "DROP TABLE users",
        );
    catalog
}

#[tokio::test]
async fn test_up_down_walkthrough() {
    let pool = memory_pool().await;
    let catalog = users_catalog();
    let migrator = Migrator::new(&catalog, pool.clone());

    let result = migrator.up().await.unwrap();
    assert_eq!(result.applied, vec![CREATE_USERS, ADD_INDEX]);
    assert!(result.skipped.is_empty());
    assert!(table_exists(&pool, "users").await);
    assert!(object_exists(&pool, "index", "users_name_idx").await);
    assert_eq!(ledger_versions(migrator.changelog()).await, vec![CREATE_USERS, ADD_INDEX]);

    let first = migrator.down().await.unwrap();
    assert_eq!(first.rolled_back_versions(), vec![ADD_INDEX]);
    assert!(!object_exists(&pool, "index", "users_name_idx").await);
    assert!(table_exists(&pool, "users").await);

    let second = migrator.down().await.unwrap();
    assert_eq!(second.rolled_back_versions(), vec![CREATE_USERS]);
    assert!(!table_exists(&pool, "users").await);

    let third = migrator.down().await.unwrap();
    assert!(third.is_noop());
    assert!(ledger_versions(migrator.changelog()).await.is_empty());
}

#[tokio::test]
async fn test_up_is_idempotent() {
    let pool = memory_pool().await;
    let catalog = users_catalog();
    let migrator = Migrator::new(&catalog, pool.clone());

    migrator.up().await.unwrap();
    let again = migrator.up().await.unwrap();

    assert_eq!(again.applied_count(), 0);
    assert_eq!(again.skipped, vec![CREATE_USERS, ADD_INDEX]);
    assert_eq!(ledger_versions(migrator.changelog()).await.len(), 2);
}

#[tokio::test]
async fn test_up_with_empty_catalog_only_creates_ledger() {
    let pool = memory_pool().await;
    let catalog = Catalog::new();

    let result = Migrator::new(&catalog, pool.clone()).up().await.unwrap();

    assert_eq!(result.applied_count(), 0);
    assert!(table_exists(&pool, "db_changelog").await);
}

#[tokio::test]
async fn test_up_stops_at_first_failure_and_keeps_earlier_work() {
    let pool = memory_pool().await;
    let mut catalog = table_catalog(&[1, 3]);
    catalog.register(2, "tester", "broken", "CREATE TABLE t2 (id INTEGER); SELECT * FROM missing;", "");
    let migrator = Migrator::new(&catalog, pool.clone());

    let err = migrator.up().await.unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Execution { version: 2, direction: MigrationDirection::Up, .. }
    ));
    assert_eq!(err.version(), Some(2));

    assert_eq!(ledger_versions(migrator.changelog()).await, vec![1]);
    assert!(table_exists(&pool, "t1").await);
    assert!(!table_exists(&pool, "t2").await);
    assert!(!table_exists(&pool, "t3").await);
}

#[tokio::test]
async fn test_down_on_empty_ledger_is_noop() {
    let pool = memory_pool().await;
    let catalog = users_catalog();

    let result = Migrator::new(&catalog, pool.clone()).down().await.unwrap();

    assert!(result.is_noop());
    assert!(table_exists(&pool, "db_changelog").await);
}

#[tokio::test]
async fn test_down_picks_latest_application_not_highest_version() {
    let pool = memory_pool().await;
    let catalog = Catalog::new();
    let migrator = Migrator::new(&catalog, pool.clone());
    let store = migrator.changelog();
    store.ensure_schema().await.unwrap();

    pool.execute("CREATE TABLE t1 (id INTEGER)", &[]).await.unwrap();
    pool.execute("CREATE TABLE t3 (id INTEGER)", &[]).await.unwrap();

    let mut tx = pool.begin_transaction().await.unwrap();
    for (version, month) in [(3, 1), (1, 2)] {
        let entry = ChangelogEntry {
            version,
            author: "tester".to_string(),
            description: format!("v{}", version),
            rollback_script: format!("DROP TABLE t{}", version),
            applied_at: Utc.with_ymd_and_hms(2023, month, 1, 0, 0, 0).unwrap(),
        };
        store.insert(tx.as_mut(), &entry).await.unwrap();
    }
    tx.commit().await.unwrap();

    let result = migrator.down().await.unwrap();
    assert_eq!(result.rolled_back_versions(), vec![1]);
    assert!(!table_exists(&pool, "t1").await);
    assert!(table_exists(&pool, "t3").await);
    assert_eq!(ledger_versions(store).await, vec![3]);
}

#[tokio::test]
async fn test_down_runs_the_stored_rollback_script() {
    let pool = memory_pool().await;
    let mut original = Catalog::new();
    original.register(1, "tester", "marker", "CREATE TABLE things (id INTEGER)", "CREATE TABLE stored_marker (id INTEGER)");
    Migrator::new(&original, pool.clone()).up().await.unwrap();

    let mut edited = Catalog::new();
    edited.register(1, "tester", "marker", "CREATE TABLE things (id INTEGER)", "CREATE TABLE edited_marker (id INTEGER)");
    Migrator::new(&edited, pool.clone()).down().await.unwrap();

    assert!(table_exists(&pool, "stored_marker").await);
    assert!(!table_exists(&pool, "edited_marker").await);
}

#[tokio::test]
async fn test_sync_rolls_back_orphans_then_applies_new_migrations() {
    let pool = memory_pool().await;
    let before = table_catalog(&[1, 2, 3]);
    Migrator::new(&before, pool.clone()).up().await.unwrap();

    let after = table_catalog(&[1, 3, 4]);
    let migrator = Migrator::new(&after, pool.clone());
    let result = migrator.sync().await.unwrap();

    assert_eq!(result.rolled_back.rolled_back_versions(), vec![2]);
    assert_eq!(result.applied.applied, vec![4]);
    assert_eq!(result.applied.skipped, vec![1, 3]);
    assert_eq!(ledger_versions(migrator.changelog()).await, vec![1, 3, 4]);
    assert!(!table_exists(&pool, "t2").await);
    assert!(table_exists(&pool, "t4").await);
}

#[tokio::test]
async fn test_sync_rolls_back_orphans_newest_first() {
    let pool = memory_pool().await;
    let before = table_catalog(&[1, 2, 3]);
    Migrator::new(&before, pool.clone()).up().await.unwrap();

    let empty = Catalog::new();
    let result = Migrator::new(&empty, pool.clone()).sync().await.unwrap();

    assert_eq!(result.rolled_back.rolled_back_versions(), vec![3, 2, 1]);
    assert_eq!(result.applied.applied_count(), 0);
    for table in ["t1", "t2", "t3"] {
        assert!(!table_exists(&pool, table).await);
    }
}

#[tokio::test]
async fn test_sync_with_matching_catalog_behaves_like_up() {
    let pool = memory_pool().await;
    let catalog = table_catalog(&[1, 2]);
    let migrator = Migrator::new(&catalog, pool.clone());

    let result = migrator.sync().await.unwrap();

    assert!(result.rolled_back.is_noop());
    assert_eq!(result.applied.applied, vec![1, 2]);
}

#[tokio::test]
async fn test_status_reports_pending_applied_and_orphaned() {
    let pool = memory_pool().await;
    Migrator::new(&table_catalog(&[1, 2]), pool.clone()).up().await.unwrap();

    let catalog = table_catalog(&[2, 5]);
    let report = Migrator::new(&catalog, pool.clone()).status().await.unwrap();

    let versions: Vec<i64> = report.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![2, 5, 1]);
    assert!(matches!(report[0].status, MigrationStatus::Applied { .. }));
    assert_eq!(report[1].status, MigrationStatus::Pending);
    assert!(matches!(report[2].status, MigrationStatus::Orphaned { .. }));
    assert_eq!(report[2].description, "create_t1");

    let json = serde_json::to_value(&report[1]).unwrap();
    assert_eq!(json["state"], "pending");
    assert_eq!(json["version"], 5);
}

#[tokio::test]
async fn test_configured_changelog_table_is_used() {
    let pool = memory_pool().await;
    let catalog = table_catalog(&[1]);
    let config = MigrateConfig::new("sqlite::memory:").with_changelog_table("schema_log");

    let migrator = Migrator::with_config(&catalog, pool.clone(), &config);
    migrator.up().await.unwrap();

    assert_eq!(migrator.changelog().table(), "schema_log");
    assert!(table_exists(&pool, "schema_log").await);
    assert!(!table_exists(&pool, "db_changelog").await);
}
