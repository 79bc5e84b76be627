mod common;

use chrono::Utc;
use elif_migrate::{
    ChangelogEntry, ChangelogStore, MigrateError, Migration, MigrationDirection, MigrationExecutor,
};

use common::{ledger_versions, memory_pool, table_exists};

#[tokio::test]
async fn test_apply_then_rollback_restores_schema() {
    let pool = memory_pool().await;
    let store = ChangelogStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    let executor = MigrationExecutor::new(store.clone());

    let migration = Migration::new(
        1,
        "tester",
        "create_widgets",
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "DROP TABLE widgets",
    );

    let entry = executor.apply_migration(&migration).await.unwrap();
    assert_eq!(entry.version, 1);
    assert_eq!(entry.rollback_script, "DROP TABLE widgets");
    assert!(table_exists(&pool, "widgets").await);
    assert_eq!(ledger_versions(&store).await, vec![1]);

    executor.rollback_entry(&entry).await.unwrap();
    assert!(!table_exists(&pool, "widgets").await);
    assert!(ledger_versions(&store).await.is_empty());
}

#[tokio::test]
async fn test_failed_forward_script_leaves_nothing_behind() {
    let pool = memory_pool().await;
    let store = ChangelogStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    let executor = MigrationExecutor::new(store.clone());

    let migration = Migration::new(
        7,
        "tester",
        "half_broken",
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY);\nINSERT INTO no_such_table VALUES (1);",
        "DROP TABLE widgets",
    );

    let err = executor.apply_migration(&migration).await.unwrap_err();
    match err {
        MigrateError::Execution { version, direction, .. } => {
            assert_eq!(version, 7);
            assert_eq!(direction, MigrationDirection::Up);
        }
        other => panic!("expected an execution error, got {:?}", other),
    }

    assert!(!table_exists(&pool, "widgets").await);
    assert!(ledger_versions(&store).await.is_empty());
}

#[tokio::test]
async fn test_failed_rollback_keeps_the_entry() {
    let pool = memory_pool().await;
    let store = ChangelogStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    let executor = MigrationExecutor::new(store.clone());

    let migration = Migration::new(2, "tester", "broken_down", "CREATE TABLE gadgets (id INTEGER)", "DROP TABLE nope");
    let entry = executor.apply_migration(&migration).await.unwrap();

    let err = executor.rollback_entry(&entry).await.unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Execution { version: 2, direction: MigrationDirection::Down, .. }
    ));
    assert!(table_exists(&pool, "gadgets").await);
    assert_eq!(ledger_versions(&store).await, vec![2]);
}

#[tokio::test]
async fn test_rollback_of_unrecorded_entry_undoes_its_script() {
    let pool = memory_pool().await;
    let store = ChangelogStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    let executor = MigrationExecutor::new(store.clone());

    let phantom = ChangelogEntry {
        version: 99,
        author: "tester".to_string(),
        description: "phantom".to_string(),
        rollback_script: "CREATE TABLE marker (id INTEGER)".to_string(),
        applied_at: Utc::now(),
    };

    let err = executor.rollback_entry(&phantom).await.unwrap_err();
    assert!(matches!(err, MigrateError::LedgerWrite { version: 99, .. }));
    assert!(!table_exists(&pool, "marker").await);
}

#[tokio::test]
async fn test_empty_scripts_still_touch_the_ledger() {
    let pool = memory_pool().await;
    let store = ChangelogStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    let executor = MigrationExecutor::new(store.clone());

    let entry = executor
        .apply_migration(&Migration::new(5, "tester", "placeholder", "", "  "))
        .await
        .unwrap();
    assert_eq!(ledger_versions(&store).await, vec![5]);

    executor.rollback_entry(&entry).await.unwrap();
    assert!(ledger_versions(&store).await.is_empty());
}

#[tokio::test]
async fn test_applied_at_is_stamped_by_the_database() {
    let pool = memory_pool().await;
    let store = ChangelogStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    let executor = MigrationExecutor::new(store.clone());

    let first = executor
        .apply_migration(&Migration::new(2, "tester", "second_by_version", "CREATE TABLE a (id INTEGER)", "DROP TABLE a"))
        .await
        .unwrap();
    let second = executor
        .apply_migration(&Migration::new(1, "tester", "first_by_version", "CREATE TABLE b (id INTEGER)", "DROP TABLE b"))
        .await
        .unwrap();

    // Values bound from the client would be written as `+00:00`
    let rows = pool.fetch_all("SELECT created FROM db_changelog ORDER BY id", &[]).await.unwrap();
    for row in &rows {
        let raw = row.get_string("created").unwrap();
        assert!(raw.ends_with('Z'), "unexpected stamp {}", raw);
    }

    let stored = store.all_entries_by_applied_time().await.unwrap();
    assert_eq!(stored, vec![first.clone(), second.clone()]);
    assert!(second.applied_at >= first.applied_at);
    assert_eq!(store.most_recent_entry().await.unwrap().unwrap().version, 1);
}

#[tokio::test]
async fn test_failed_ledger_insert_undoes_the_script() {
    let pool = memory_pool().await;
    let store = ChangelogStore::new(pool.clone());
    store.ensure_schema().await.unwrap();
    let executor = MigrationExecutor::new(store.clone());

    let migration = Migration::new(
        3,
        "tester",
        "hides_the_ledger",
        "CREATE TABLE widgets (id INTEGER);\nALTER TABLE db_changelog RENAME TO gone;",
        "DROP TABLE widgets",
    );

    let err = executor.apply_migration(&migration).await.unwrap_err();
    assert!(matches!(err, MigrateError::LedgerWrite { version: 3, .. }));

    assert!(!table_exists(&pool, "widgets").await);
    assert!(!table_exists(&pool, "gone").await);
    assert!(table_exists(&pool, "db_changelog").await);
    assert!(ledger_versions(&store).await.is_empty());
}
