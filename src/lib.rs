//! whis - household inventory service with portable backup and restore.
//!
//! - [`inventory`] - SQLite-backed items, images and backup status records
//! - [`backup`] - archive codec and the backup, restore and registry
//!   operations on top of it
//! - [`http`] - the axum API used by the web frontend
//!
//! # Example
//!
//! ```no_run
//! use whis::backup::BackupService;
//! use whis::config::Config;
//! use whis::inventory::OwnerId;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let service = BackupService::open(&config.storage.resolve()?)?;
//!
//! let owner: OwnerId = "6f1c0f4e-2f38-4d8e-9a43-0d2b7f0a9c11".parse()?;
//! let record = service.create_backup(owner)?;
//! let result = service.restore_backup(owner, record.id)?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod backup;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod inventory;
pub mod metrics;
pub mod paths;
pub mod utils;

pub use error::{Error, Result};
