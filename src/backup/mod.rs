//! Backup and restore of an owner's whole inventory.
//!
//! [`BackupService`] ties the pieces together:
//!
//! - [`archive`] - the archive codec (manifest + images, ZIP/deflate)
//! - `create` - backup orchestration, one status record per attempt
//! - `restore` - destructive-replace restore with per-item error reporting
//! - `registry` - listing, lookup, download and deletion of backups
//!
//! # Execution model
//!
//! Every operation runs synchronously to completion before it returns, so a
//! backup's status record is always settled (`completed` or `failed`) when
//! the caller gets an answer. The cost is that the caller waits for the full
//! archive to be written. There is no background queue and no cancellation.
//!
//! # Concurrency
//!
//! Operations for the same owner are not mutually excluded. Two concurrent
//! backups both succeed with independent artifacts. A restore running
//! concurrently with a backup for the same owner may let the backup observe
//! a partially-deleted inventory.
//!
//! # Async Usage
//!
//! All operations block on SQLite and the filesystem. From async contexts
//! use the `*_async` variants, which run the whole operation under
//! `spawn_blocking`.

pub mod archive;
mod async_ops;
mod create;
mod registry;
mod restore;
mod validation;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StoragePaths;
use crate::inventory::InventoryStore;

pub use archive::{ArchiveReader, AssetResolver, EncodeSummary, FsAssetResolver, ManifestItem};
pub use registry::Download;
pub use restore::{RESTORE_SUCCESS_MESSAGE, RestoreResult};

/// Backup and restore operations over one inventory store.
///
/// # Thread Safety
///
/// `BackupService` is `Clone` and can be shared across threads. Clones share
/// the same store.
///
/// # Example
///
/// ```ignore
/// use whis::backup::BackupService;
///
/// let service = BackupService::new(store, "/data/uploads", "/data/backups")?;
/// let record = service.create_backup(owner)?;
/// let result = service.restore_backup(owner, record.id)?;
/// println!("{} items restored", result.items_restored);
/// ```
#[derive(Clone)]
pub struct BackupService {
    store: InventoryStore,
    /// Live image-asset storage root
    uploads_dir: PathBuf,
    /// Dedicated backup storage root
    backups_dir: PathBuf,
}

impl BackupService {
    /// Creates a service, creating both storage roots if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub fn new(
        store: InventoryStore,
        uploads_dir: impl Into<PathBuf>,
        backups_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let uploads_dir = uploads_dir.into();
        let backups_dir = backups_dir.into();

        for dir in [&uploads_dir, &backups_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        Ok(Self {
            store,
            uploads_dir,
            backups_dir,
        })
    }

    /// Opens the database and storage roots described by `paths`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a directory
    /// cannot be created.
    pub fn open(paths: &StoragePaths) -> Result<Self> {
        let store = InventoryStore::open(&paths.database)?;
        Self::new(store, &paths.uploads_dir, &paths.backups_dir)
    }

    pub fn store(&self) -> &InventoryStore {
        &self.store
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }
}
