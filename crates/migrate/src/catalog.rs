//! Migration Catalog - the set of migrations known to this build
//!
//! A [`Catalog`] is built by the host program before any engine operation
//! runs, either by calling [`Catalog::register`] once per migration or by
//! loading a directory of migration files through
//! [`MigrationManager`](crate::manager::MigrationManager). It is then lent to a
//! [`Migrator`](crate::migrator::Migrator).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a database migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Unique version, also the default application order (typically a UTC timestamp)
    pub version: i64,
    pub author: String,
    pub description: String,
    /// SQL applied by `up`; passed to the database untouched
    pub forward_script: String,
    /// SQL captured into the changelog at apply time and run by rollbacks
    pub reverse_script: String,
}

impl Migration {
    pub fn new(
        version: i64,
        author: impl Into<String>,
        description: impl Into<String>,
        forward_script: impl Into<String>,
        reverse_script: impl Into<String>,
    ) -> Self {
        Self {
            version,
            author: author.into(),
            description: description.into(),
            forward_script: forward_script.into(),
            reverse_script: reverse_script.into(),
        }
    }
}

/// In-memory registry of migrations keyed by version
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    migrations: BTreeMap<i64, Migration>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration. A second registration of the same version
    /// replaces the first.
    pub fn register(
        &mut self,
        version: i64,
        author: impl Into<String>,
        description: impl Into<String>,
        forward_script: impl Into<String>,
        reverse_script: impl Into<String>,
    ) -> &mut Self {
        self.insert(Migration::new(
            version,
            author,
            description,
            forward_script,
            reverse_script,
        ));
        self
    }

    /// Insert a prebuilt migration, returning the definition it replaced
    pub fn insert(&mut self, migration: Migration) -> Option<Migration> {
        let version = migration.version;
        let previous = self.migrations.insert(version, migration);
        if previous.is_some() {
            tracing::warn!("Migration v{} registered twice, keeping the last definition", version);
        }
        previous
    }

    /// All registered versions, ascending. This is the application order.
    pub fn ordered_versions(&self) -> Vec<i64> {
        self.migrations.keys().copied().collect()
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations.get(&version)
    }

    pub fn contains(&self, version: i64) -> bool {
        self.migrations.contains_key(&version)
    }

    /// Migrations in ascending version order
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl FromIterator<Migration> for Catalog {
    fn from_iter<I: IntoIterator<Item = Migration>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for migration in iter {
            catalog.insert(migration);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_versions_ignore_registration_order() {
        let mut catalog = Catalog::new();
        for version in [3, 2, 7, 5] {
            catalog.register(version, "tester", format!("v{}", version), "", "");
        }

        assert_eq!(catalog.ordered_versions(), vec![2, 3, 5, 7]);
        let described: Vec<_> = catalog.iter().map(|m| m.description.as_str()).collect();
        assert_eq!(described, vec!["v2", "v3", "v5", "v7"]);
    }

    #[test]
    fn test_duplicate_registration_keeps_last() {
        let mut catalog = Catalog::new();
        catalog
            .register(1, "alice", "first", "CREATE TABLE a (id INT)", "DROP TABLE a")
            .register(1, "bob", "second", "CREATE TABLE b (id INT)", "DROP TABLE b");

        assert_eq!(catalog.len(), 1);
        let migration = catalog.get(1).unwrap();
        assert_eq!(migration.author, "bob");
        assert_eq!(migration.forward_script, "CREATE TABLE b (id INT)");
    }

    #[test]
    fn test_insert_returns_replaced_definition() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert(Migration::new(9, "a", "one", "", "")).is_none());
        let replaced = catalog.insert(Migration::new(9, "a", "two", "", "")).unwrap();
        assert_eq!(replaced.description, "one");
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.ordered_versions().is_empty());
        assert!(!catalog.contains(1));
    }

    #[test]
    fn test_collect_into_catalog() {
        let catalog: Catalog = vec![
            Migration::new(20230102000000, "a", "add_index", "", ""),
            Migration::new(20230101000000, "a", "create_users", "", ""),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.ordered_versions(), vec![20230101000000, 20230102000000]);
    }
}
