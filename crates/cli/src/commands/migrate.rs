use std::sync::Arc;

use anyhow::Context;
use elif_migrate::{
    connect, Catalog, DatabasePool, MigrateConfig, MigrationManager, MigrationStatus, MigrationStatusEntry,
    Migrator,
};

/// Apply every pending migration
pub async fn up(config: &MigrateConfig) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    let pool = open_pool(config).await?;

    let outcome = Migrator::with_config(&catalog, pool.clone(), config).up().await;
    pool.close().await;
    let result = outcome.context("Migration run failed")?;

    if result.applied.is_empty() {
        println!("Database is up to date ({} migration(s) already applied)", result.skipped_count());
    } else {
        println!(
            "Applied {} migration(s) in {}ms",
            result.applied_count(),
            result.execution_time_ms
        );
        for version in &result.applied {
            println!("  ✅ v{}", version);
        }
    }
    Ok(())
}

/// Roll back the most recently applied migration
pub async fn down(config: &MigrateConfig) -> anyhow::Result<()> {
    // Down only reads the ledger, so a broken migrations directory must not block it
    let catalog = Catalog::new();
    let pool = open_pool(config).await?;

    let outcome = Migrator::with_config(&catalog, pool.clone(), config).down().await;
    pool.close().await;
    let result = outcome.context("Rollback failed")?;

    match result.rolled_back.first() {
        Some(entry) => println!(
            "Rolled back v{} {} <{}>",
            entry.version, entry.description, entry.author
        ),
        None => println!("No migrations found, nothing to roll back"),
    }
    Ok(())
}

/// Roll back migrations missing from the directory, then apply pending ones
pub async fn sync(config: &MigrateConfig) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    let pool = open_pool(config).await?;

    let outcome = Migrator::with_config(&catalog, pool.clone(), config).sync().await;
    pool.close().await;
    let result = outcome.context("Sync failed")?;

    for entry in &result.rolled_back.rolled_back {
        println!("  ↩️  v{} {} (rolled back)", entry.version, entry.description);
    }
    for version in &result.applied.applied {
        println!("  ✅ v{}", version);
    }
    println!(
        "Sync complete: {} rolled back, {} applied",
        result.rolled_back.rolled_back_count(),
        result.applied.applied_count()
    );
    Ok(())
}

/// Print the state of every known migration
pub async fn status(config: &MigrateConfig, json: bool) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    let pool = open_pool(config).await?;

    let outcome = Migrator::with_config(&catalog, pool.clone(), config).status().await;
    pool.close().await;
    let report = outcome.context("Failed to read migration status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_status(&report));
    }
    Ok(())
}

fn load_catalog(config: &MigrateConfig) -> anyhow::Result<Catalog> {
    MigrationManager::new(&config.migrations_dir)
        .load_catalog()
        .with_context(|| format!("Failed to load migrations from {}", config.migrations_dir.display()))
}

async fn open_pool(config: &MigrateConfig) -> anyhow::Result<Arc<dyn DatabasePool>> {
    connect(&config.database_url, config.pool.clone())
        .await
        .context("Failed to connect to database")
}

fn render_status(report: &[MigrationStatusEntry]) -> String {
    let mut out = String::from("Migration Status:\n================\n");
    if report.is_empty() {
        out.push_str("No migrations found\n");
        return out;
    }

    for entry in report {
        let line = match &entry.status {
            MigrationStatus::Pending => format!("  ⏳ v{} {}", entry.version, entry.description),
            MigrationStatus::Applied { applied_at } => format!(
                "  ✅ v{} {} (applied {})",
                entry.version,
                entry.description,
                applied_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            MigrationStatus::Orphaned { applied_at } => format!(
                "  ⚠️  v{} {} (applied {}, missing from migrations directory)",
                entry.version,
                entry.description,
                applied_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}
