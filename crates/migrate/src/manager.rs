//! Migration Manager - File system operations for migrations
//!
//! Handles creating, loading, and parsing migration files. A migration file is
//! named `<version>_<description>.sql` and looks like:
//!
//! ```sql
//! -- Migration: create_users
//! -- Author: Jane Doe <jane@example.com>
//!
//! -- Up migration
//! CREATE TABLE users (id BIGINT PRIMARY KEY);
//!
//! -- Down migration
//! DROP TABLE users;
//! ```

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, Migration};
use crate::error::{MigrateError, MigrateResult};

/// Author written into templates when no identity is known
pub const PLACEHOLDER_AUTHOR: &str = "YOURNAME@HERE";

static FILE_STEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_([A-Za-z0-9_\-]+)$").expect("valid file stem pattern"));
static SHORT_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_\-]+$").expect("valid description pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Up,
    Down,
}

/// Migration manager for creating and loading migration files
#[derive(Debug, Clone)]
pub struct MigrationManager {
    migrations_dir: PathBuf,
}

impl MigrationManager {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Write a new migration template stamped with the current UTC time
    pub fn create_migration(&self, short_description: &str, author: &str) -> MigrateResult<PathBuf> {
        self.create_migration_at(short_description, author, Utc::now())
    }

    /// Write a new migration template whose version is derived from `now`
    pub fn create_migration_at(
        &self,
        short_description: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> MigrateResult<PathBuf> {
        let slug = slugify(short_description);
        if !SHORT_DESCRIPTION.is_match(&slug) {
            return Err(MigrateError::InvalidMigration(format!(
                "short description '{}' must contain only letters, digits, '_' or '-'",
                short_description
            )));
        }

        fs::create_dir_all(&self.migrations_dir)?;

        let version = now.format("%Y%m%d%H%M%S").to_string();
        let filepath = self.migrations_dir.join(format!("{}_{}.sql", version, slug));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&filepath)
            .map_err(|e| {
                MigrateError::InvalidMigration(format!("Failed to create {}: {}", filepath.display(), e))
            })?;
        file.write_all(create_migration_template(&slug, author, now).as_bytes())?;

        tracing::info!("Created migration {}", filepath.display());
        Ok(filepath)
    }

    /// Load every `.sql` file in the directory into a new catalog
    pub fn load_catalog(&self) -> MigrateResult<Catalog> {
        let mut catalog = Catalog::new();
        self.load_into(&mut catalog)?;
        Ok(catalog)
    }

    /// Register every `.sql` file in the directory with `catalog`, in file
    /// name order. A missing directory registers nothing.
    pub fn load_into(&self, catalog: &mut Catalog) -> MigrateResult<usize> {
        if !self.migrations_dir.exists() {
            tracing::debug!("Migrations directory {} does not exist", self.migrations_dir.display());
            return Ok(0);
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.migrations_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "sql") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let migration = parse_migration_file(path)?;
            catalog.register(
                migration.version,
                migration.author,
                migration.description,
                migration.forward_script,
                migration.reverse_script,
            );
        }

        Ok(paths.len())
    }
}

/// Parse a migration file into a Migration struct
pub fn parse_migration_file(path: &Path) -> MigrateResult<Migration> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MigrateError::InvalidMigration(format!("Invalid migration filename: {}", path.display())))?;

    let captures = FILE_STEM.captures(stem).ok_or_else(|| {
        MigrateError::InvalidMigration(format!(
            "Migration filename must follow format <version>_<description>.sql: {}",
            path.display()
        ))
    })?;
    let version: i64 = captures[1].parse().map_err(|_| {
        MigrateError::InvalidMigration(format!("Migration version out of range: {}", path.display()))
    })?;

    let content = fs::read_to_string(path)?;
    let mut migration = parse_migration_content(version, &content)?;
    if migration.description.is_empty() {
        migration.description = captures[2].to_string();
    }
    Ok(migration)
}

/// Parse migration content into header fields and UP and DOWN scripts
pub fn parse_migration_content(version: i64, content: &str) -> MigrateResult<Migration> {
    let mut description = String::new();
    let mut author = String::new();
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut section = Section::Header;
    let mut saw_up = false;

    for line in content.lines() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();

        if lowered == "-- up migration" || lowered == "-- up" {
            section = Section::Up;
            saw_up = true;
            continue;
        } else if lowered == "-- down migration" || lowered == "-- down" {
            section = Section::Down;
            continue;
        }

        if section == Section::Header {
            if let Some(value) = header_value(trimmed, "migration") {
                description = value.to_string();
            } else if let Some(value) = header_value(trimmed, "author") {
                author = value.to_string();
            }
            continue;
        }

        match section {
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
            Section::Header => {}
        }
    }

    if !saw_up {
        return Err(MigrateError::InvalidMigration(format!(
            "Migration v{} has no '-- Up migration' section",
            version
        )));
    }

    if author.is_empty() {
        author = PLACEHOLDER_AUTHOR.to_string();
    }

    Ok(Migration::new(
        version,
        author,
        description,
        section_script(&up_sql),
        section_script(&down_sql),
    ))
}

/// Section body as written. A body holding only comments and blank lines,
/// such as an untouched template, is an empty script.
fn section_script(lines: &[&str]) -> String {
    let has_sql = lines.iter().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with("--")
    });

    if has_sql {
        lines.join("\n").trim().to_string()
    } else {
        String::new()
    }
}

/// Value of a `-- Key: value` header line
fn header_value<'l>(line: &'l str, key: &str) -> Option<&'l str> {
    let rest = line.strip_prefix("--")?.trim_start();
    let (name, value) = rest.split_once(':')?;
    if name.trim().eq_ignore_ascii_case(key) {
        Some(value.trim())
    } else {
        None
    }
}

fn slugify(short_description: &str) -> String {
    short_description.trim().replace(' ', "_").to_lowercase()
}

/// Create migration template content
fn create_migration_template(name: &str, author: &str, now: DateTime<Utc>) -> String {
    format!(
        "-- Migration: {}\n\
         -- Author: {}\n\
         -- Created: {}\n\n\
         -- Up migration\n\
         -- Add your schema changes here\n\n\n\
         -- Down migration\n\
         -- Add rollback statements here\n\n",
        name,
        author,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    )
}
