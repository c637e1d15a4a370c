//! CLI command implementations for whis.
//!
//! - [`serve`] - HTTP API server
//! - [`backup`] - create, list, restore and delete backups from the shell
//!
//! Both load the same configuration and drive the same
//! [`whis::backup::BackupService`].

pub mod backup;
pub mod serve;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use whis::config::{Config, LogFormat, LoggingConfig};

/// Loads configuration, applies `--data-dir`, and validates it.
///
/// Validation warnings go to stderr, since logging is not set up yet;
/// errors abort.
pub fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load(path)?;
    if let Some(dir) = data_dir {
        config.storage.data_dir = Some(dir);
    }

    let result = config.validate()?;
    for warning in &result.warnings {
        eprintln!("Warning: {warning}");
    }

    Ok(config)
}

/// Initializes stdout logging. `RUST_LOG` overrides the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        },
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        },
    }
}
