mod commands;
mod identity;
mod logging;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use elif_migrate::{MigrateConfig, MigrateResult};

use commands::{create, migrate};
use logging::LoggingConfig;

#[derive(Parser)]
#[command(name = "elif-migrate")]
#[command(about = "Apply, roll back and sync versioned SQL migrations")]
#[command(version)]
struct Cli {
    /// Database URL; overrides DATABASE_URL and the DB_* variables
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Directory holding <version>_<description>.sql files
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Up,

    /// Roll back the most recently applied migration
    Down,

    /// Roll back migrations that left the migrations directory, then apply pending ones
    Sync,

    /// Show which migrations are applied, pending or orphaned
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new migration file
    Create {
        /// Short description, used in the file name
        short_description: String,

        /// Author recorded in the file; defaults to the git identity
        #[arg(long)]
        author: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(&LoggingConfig::new(cli.log_level.as_deref(), cli.json_logs)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Built on demand: create only writes a file and never reads database settings
    let config = || load_config(cli.database_url.clone(), cli.migrations_dir.clone(), |name| env::var(name).ok());

    match cli.command {
        Commands::Up => migrate::up(&config()?).await,
        Commands::Down => migrate::down(&config()?).await,
        Commands::Sync => migrate::sync(&config()?).await,
        Commands::Status { json } => migrate::status(&config()?, json).await,
        Commands::Create {
            short_description,
            author,
        } => {
            let migrations_dir = cli
                .migrations_dir
                .clone()
                .unwrap_or_else(MigrateConfig::migrations_dir_from_env);
            create::create(&migrations_dir, &short_description, author)
        }
    }
}

/// Resolve configuration with command line flags taking precedence over the
/// environment. Validation sees only the final values.
fn load_config<F>(database_url: Option<String>, migrations_dir: Option<PathBuf>, lookup: F) -> MigrateResult<MigrateConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = MigrateConfig::from_lookup(|name| match (name, &database_url) {
        ("DATABASE_URL", Some(url)) => Some(url.clone()),
        _ => lookup(name),
    })?;
    if let Some(dir) = migrations_dir {
        config.migrations_dir = dir;
    }
    Ok(config)
}
