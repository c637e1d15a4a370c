//! Path utilities for whis data files.
//!
//! # Base Directory
//! - [`get_whis_dir`] - `~/.whis/` (base directory for all whis data)
//!
//! # Files
//! - [`get_config_path`] - `~/.whis/whis.toml` (service settings)
//!
//! The database, the live image-asset root and the backup root default to
//! children of the base directory, see [`crate::config::StorageConfig`].

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::constants;

/// Get the whis base directory.
///
/// Resolution order:
/// 1. `WHIS_HOME` environment variable (if set)
/// 2. `~/.whis/` (default)
pub fn get_whis_dir() -> Result<PathBuf> {
    if let Ok(whis_home) = std::env::var("WHIS_HOME")
        && !whis_home.is_empty()
    {
        return Ok(PathBuf::from(whis_home));
    }

    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".whis"))
}

/// Get the default config path: `~/.whis/whis.toml`
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_whis_dir()?.join(constants::CONFIG_FILE))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
