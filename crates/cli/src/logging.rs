//! Logging setup for the command line tool
//!
//! Logs go to stderr so that `status --json` output on stdout stays parseable.

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for the migration tool
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Include the event target in plain text output
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Option<&str>, json_format: bool) -> Self {
        Self {
            level: level.unwrap_or("info").to_string(),
            json_format,
            ..Self::default()
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("{},sqlx=warn", self.level)
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.filter_directive()))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).with_target(config.include_target))
            .try_init()?;
    }

    tracing::debug!(
        "Logging initialized (level: {}, format: {})",
        config.level,
        if config.json_format { "JSON" } else { "text" }
    );
    Ok(())
}
