//! Backup registry: listing, lookup, download and deletion.

use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use super::BackupService;
use crate::error::{Error, Result};
use crate::inventory::{BackupStatus, BackupStatusRecord, OwnerId};

/// A completed backup's artifact, checked to exist, plus the filename to
/// present it under. Callers stream the file rather than buffering it.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub path: PathBuf,
}

impl BackupService {
    /// Lists `owner`'s completed backups, newest first.
    ///
    /// Records with any of filename, path, size or counts unset (crashed or
    /// failed attempts) are kept in the database but never listed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the query fails.
    pub fn list_backups(&self, owner: OwnerId) -> Result<Vec<BackupStatusRecord>> {
        self.store.list_backups(owner).map_err(Error::storage)
    }

    /// Looks up one of `owner`'s status records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record is absent or belongs to
    /// another owner, [`Error::Storage`] if the lookup fails.
    pub fn get_backup(&self, owner: OwnerId, backup_id: Uuid) -> Result<BackupStatusRecord> {
        if let Some(record) = self
            .store
            .find_backup(owner, backup_id)
            .map_err(Error::storage)?
        {
            return Ok(record);
        }

        if let Ok(Some(actual)) = self.store.backup_owner(backup_id) {
            warn!(
                target: "audit",
                event_type = "cross_owner_access",
                %owner,
                %actual,
                %backup_id,
                "Backup requested by another owner"
            );
        }
        Err(Error::backup_not_found())
    }

    /// Deletes one of `owner`'s backups: artifact file first, then record.
    ///
    /// A missing artifact file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record is absent or belongs to
    /// another owner, [`Error::Io`] if the artifact exists but cannot be
    /// removed.
    pub fn delete_backup(&self, owner: OwnerId, backup_id: Uuid) -> Result<()> {
        let record = self.get_backup(owner, backup_id)?;

        if let Some(path) = &record.file_path {
            match fs::remove_file(path) {
                Ok(()) => {},
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(%backup_id, path = %path.display(), "Backup file already gone");
                },
                Err(e) => {
                    return Err(Error::io(
                        format!("removing backup file {}", path.display()),
                        e,
                    ));
                },
            }
        }

        if !self
            .store
            .delete_backup_record(owner, backup_id)
            .map_err(Error::storage)?
        {
            return Err(Error::backup_not_found());
        }

        info!(%owner, %backup_id, "Backup deleted");
        Ok(())
    }

    /// Locates the artifact of one of `owner`'s completed backups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record is absent, foreign or not
    /// completed, and [`Error::ArtifactMissing`] if its file is gone.
    pub fn download_backup(&self, owner: OwnerId, backup_id: Uuid) -> Result<Download> {
        let record = self.get_backup(owner, backup_id)?;
        let (filename, path) = completed_artifact(record)?;

        if !path.is_file() {
            return Err(Error::ArtifactMissing { path });
        }
        Ok(Download { filename, path })
    }
}

/// Filename and path of a completed backup.
///
/// Records that never completed have no artifact and are reported the same
/// way as absent ones.
pub(crate) fn completed_artifact(record: BackupStatusRecord) -> Result<(String, PathBuf)> {
    match record {
        BackupStatusRecord {
            status: BackupStatus::Completed,
            filename: Some(filename),
            file_path: Some(path),
            ..
        } => Ok((filename, path)),
        _ => Err(Error::backup_not_found()),
    }
}
