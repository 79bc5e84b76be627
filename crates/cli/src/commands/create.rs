use std::path::Path;

use anyhow::Context;
use elif_migrate::MigrationManager;

use crate::identity;

/// Write a new migration template into the migrations directory
pub fn create(migrations_dir: &Path, short_description: &str, author: Option<String>) -> anyhow::Result<()> {
    let author = author.unwrap_or_else(identity::who_am_i);
    let manager = MigrationManager::new(migrations_dir);

    let path = manager
        .create_migration(short_description, &author)
        .with_context(|| format!("Failed to create migration '{}'", short_description))?;

    println!("Created migration: {}", path.display());
    Ok(())
}
