//! Configuration types for the whis service.
//!
//! Loads `whis.toml` with three optional sections:
//!
//! - [`ServerConfig`] - HTTP bind address and gateway trust settings
//! - [`StorageConfig`] - database, live image-asset root and backup root
//! - [`LoggingConfig`] - log level and output format
//!
//! Every field has a default, so an absent file is a valid configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::paths;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root of `whis.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret of the fronting auth gateway. When set, requests must
    /// carry `Authorization: Bearer <api_key>`.
    pub api_key: Option<String>,
    /// Header carrying the already-authenticated owner id.
    pub owner_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: constants::DEFAULT_HOST.to_string(),
            port: constants::DEFAULT_PORT,
            api_key: None,
            owner_header: constants::DEFAULT_OWNER_HEADER.to_string(),
        }
    }
}

/// Storage locations. Relative paths resolve against `data_dir`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory; defaults to `$WHIS_HOME` or `~/.whis`.
    pub data_dir: Option<PathBuf>,
    pub database: PathBuf,
    /// Live image-asset storage root.
    pub uploads_dir: PathBuf,
    /// Dedicated backup storage root.
    pub backups_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database: PathBuf::from(constants::DEFAULT_DATABASE_FILE),
            uploads_dir: PathBuf::from(constants::DEFAULT_UPLOADS_DIR),
            backups_dir: PathBuf::from(constants::DEFAULT_BACKUPS_DIR),
        }
    }
}

/// Absolute storage locations after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub uploads_dir: PathBuf,
    pub backups_dir: PathBuf,
}

impl StorageConfig {
    /// Resolves all locations against the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no `data_dir` is configured and the home
    /// directory cannot be determined.
    pub fn resolve(&self) -> Result<StoragePaths> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => paths::get_whis_dir()?,
        };
        Ok(StoragePaths {
            database: paths::resolve_in(&data_dir, &self.database),
            uploads_dir: paths::resolve_in(&data_dir, &self.uploads_dir),
            backups_dir: paths::resolve_in(&data_dir, &self.backups_dir),
            data_dir,
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Fields have invalid types
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load an explicit config file, or the default one if it exists.
    ///
    /// Falls back to built-in defaults when no path is given and
    /// `~/.whis/whis.toml` is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is given but cannot be loaded,
    /// or if the default file exists but is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let default_path = paths::get_config_path()?;
        if default_path.exists() {
            Self::load_from(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails with one or more errors:
    /// - Port 0
    /// - Empty host or owner header
    /// - Live asset root and backup root resolving to the same directory
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Server
        if self.server.port == 0 {
            errors.push(
                "Server port cannot be 0. Use a valid port number (1-65535)\n  \
                 Common ports: 8000 (default), 8080"
                    .to_string(),
            );
        }

        if self.server.port < 1024 && self.server.port > 0 {
            warnings.push(format!(
                "Server port {} is a system/privileged port (< 1024)\n  \
                 Recommendation: Use ports >= 1024 (e.g., 8000, 8080) to avoid permission issues",
                self.server.port
            ));
        }

        if self.server.host.trim().is_empty() {
            errors.push("server.host cannot be empty".to_string());
        }

        if self.server.owner_header.trim().is_empty() {
            errors.push("server.owner_header cannot be empty".to_string());
        }

        match &self.server.api_key {
            Some(key) if key.is_empty() => {
                errors.push("server.api_key cannot be empty (omit it to disable)".to_string());
            },
            Some(key) if key.len() < constants::MIN_API_KEY_LEN => {
                warnings.push(format!(
                    "server.api_key is shorter than {} characters\n  \
                     Recommendation: use a long random secret shared with the auth gateway",
                    constants::MIN_API_KEY_LEN
                ));
            },
            Some(_) => {},
            None => warnings.push(
                "server.api_key is not set: the owner header is trusted from any client\n  \
                 Only run without a key behind an authenticating gateway"
                    .to_string(),
            ),
        }

        // 2. Storage
        match self.storage.resolve() {
            Ok(resolved) => {
                if resolved.uploads_dir == resolved.backups_dir {
                    errors.push(format!(
                        "storage.backups_dir must differ from storage.uploads_dir (both resolve to {})",
                        resolved.backups_dir.display()
                    ));
                }
            },
            Err(e) => errors.push(format!("Failed to resolve storage paths: {e}")),
        }

        // 3. Logging
        if self.logging.level.trim().is_empty() {
            errors.push("logging.level cannot be empty".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, constants::DEFAULT_PORT);
        assert_eq!(config.server.host, constants::DEFAULT_HOST);
        assert_eq!(config.server.owner_header, constants::DEFAULT_OWNER_HEADER);
        assert!(config.server.api_key.is_none());
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(
            config.storage.backups_dir,
            PathBuf::from(constants::DEFAULT_BACKUPS_DIR)
        );
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[server]
host = "0.0.0.0"
port = 9090
api_key = "0123456789abcdef0123"
owner_header = "x-user-id"

[storage]
data_dir = "/srv/whis"
database = "inventory.db"
uploads_dir = "/mnt/assets"
backups_dir = "archives"

[logging]
level = "debug"
format = "json"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.owner_header, "x-user-id");
        assert_eq!(config.logging.format, LogFormat::Json);

        let resolved = config.storage.resolve().unwrap();
        assert_eq!(resolved.data_dir, PathBuf::from("/srv/whis"));
        assert_eq!(resolved.database, PathBuf::from("/srv/whis/inventory.db"));
        assert_eq!(resolved.uploads_dir, PathBuf::from("/mnt/assets"));
        assert_eq!(resolved.backups_dir, PathBuf::from("/srv/whis/archives"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_port_zero() {
        let toml_str = r#"
[server]
port = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("port cannot be 0"));
    }

    #[test]
    fn test_validate_privileged_port_warns() {
        let toml_str = r#"
[server]
port = 80
api_key = "0123456789abcdef0123"

[storage]
data_dir = "/srv/whis"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let result = config.validate().unwrap();
        assert!(result.has_warnings());
        assert!(result.warnings[0].contains("privileged"));
    }

    #[test]
    fn test_validate_same_uploads_and_backups_dir() {
        let toml_str = r#"
[storage]
data_dir = "/srv/whis"
uploads_dir = "files"
backups_dir = "/srv/whis/files"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("backups_dir must differ"));
    }

    #[test]
    fn test_validate_missing_api_key_warns() {
        let toml_str = r#"
[storage]
data_dir = "/srv/whis"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let result = config.validate().unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("api_key")));
    }

    #[test]
    fn test_validate_multiple_errors() {
        let toml_str = r#"
[server]
port = 0
host = ""
owner_header = " "
api_key = ""

[logging]
level = ""
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("port"));
        assert!(err.contains("server.host"));
        assert!(err.contains("owner_header"));
        assert!(err.contains("api_key"));
        assert!(err.contains("logging.level"));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let toml_str = r#"
[logging]
format = "xml"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whis.toml");
        fs::write(&path, "[server]\nport = 8123\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml")))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Failed to read config file"));
    }
}
