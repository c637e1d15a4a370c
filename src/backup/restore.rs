//! Restore orchestration.
//!
//! Restore is a full replacement, not a merge: once the archive has decoded,
//! every item the owner currently has is deleted and the archive's items are
//! inserted with fresh ids. The delete commits on its own; a crash between
//! it and the final insert transaction leaves the owner with an empty
//! inventory.

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek};
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::BackupService;
use super::archive::{ArchiveReader, ManifestImage};
use super::registry::completed_artifact;
use super::validation::asset_path;
use crate::error::{Error, Result};
use crate::inventory::{OwnerId, RestoredImage, RestoredItem};
use crate::metrics;

/// Message carried by every successful [`RestoreResult`].
pub const RESTORE_SUCCESS_MESSAGE: &str = "Backup restored successfully";

/// Outcome of a restore that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub success: bool,
    pub message: String,
    pub items_restored: u64,
    pub images_restored: u64,
    /// Pre-existing items removed by the replace.
    pub items_removed: u64,
    /// Per-item and per-image problems; empty when nothing failed.
    pub errors: Vec<String>,
}

fn item_error(label: &str, reason: &str) -> String {
    format!("Error restoring item {label}: {reason}")
}

impl BackupService {
    /// Replaces `owner`'s inventory with the content of one of their backups.
    ///
    /// Items and images that cannot be restored are reported in
    /// [`RestoreResult::errors`] without aborting the rest.
    ///
    /// # Errors
    ///
    /// Nothing is deleted when any of these is returned:
    /// - [`Error::NotFound`] if the backup is absent, foreign or not completed
    /// - [`Error::ArtifactMissing`] if its file is gone
    /// - [`Error::MalformedArchive`] if the archive does not decode
    /// - [`Error::Storage`] if the delete step fails
    ///
    /// After the delete step, a failed insert transaction returns
    /// [`Error::RestoreFailed`] and leaves the inventory empty.
    pub fn restore_backup(&self, owner: OwnerId, backup_id: Uuid) -> Result<RestoreResult> {
        let span = info_span!("restore_backup", %owner, %backup_id);
        let _enter = span.enter();

        let result = self.run_restore(owner, backup_id);
        match &result {
            Ok(r) => metrics::record_restore("completed", r.errors.len()),
            Err(e) => {
                warn!(error = %e, "Restore aborted");
                metrics::record_restore(e.kind(), 0);
            },
        }
        result
    }

    fn run_restore(&self, owner: OwnerId, backup_id: Uuid) -> Result<RestoreResult> {
        let record = self.get_backup(owner, backup_id)?;
        let (_, path) = completed_artifact(record)?;

        if !path.is_file() {
            return Err(Error::ArtifactMissing { path });
        }

        let mut reader = ArchiveReader::open_path(&path)?;
        let entries = reader.take_items();
        let mut errors = Vec::new();

        let removed = self
            .store
            .delete_items_for_owner(owner)
            .map_err(Error::storage)?;
        info!(items = removed.items, "Removed existing inventory");

        let mut pending = Vec::with_capacity(entries.len());
        let mut copied: Vec<PathBuf> = Vec::new();

        for entry in entries {
            let item = match entry {
                Ok(item) => item,
                Err(bad) => {
                    errors.push(item_error(&bad.label, &bad.reason));
                    continue;
                },
            };

            let mut images = Vec::with_capacity(item.images.len());
            for image in &item.images {
                match self.extract_image(&mut reader, image) {
                    Ok(Some(restored)) => {
                        copied.push(restored.file_path.clone());
                        images.push(restored);
                    },
                    Ok(None) => errors.push(format!(
                        "Image {} for item {} not found in backup",
                        image.filename, item.name
                    )),
                    Err(e) => errors.push(format!(
                        "Error restoring image {} for item {}: {e}",
                        image.filename, item.name
                    )),
                }
            }

            pending.push(RestoredItem {
                id: Uuid::new_v4(),
                label: item.name.clone(),
                details: item.details(),
                created_at: item.created_at,
                updated_at: item.updated_at,
                images,
            });
        }

        let outcome = match self.store.insert_restored(owner, pending) {
            Ok(outcome) => outcome,
            Err(e) => {
                remove_files(&copied);
                return Err(Error::restore_failed(format!("{e:#}")));
            },
        };

        for failure in outcome.failures {
            errors.push(item_error(&failure.label, &failure.reason));
            remove_files(&failure.orphaned_files);
        }

        let old_files: Vec<PathBuf> = removed.images.into_iter().map(|i| i.file_path).collect();
        remove_files(&old_files);

        info!(
            items = outcome.items_restored,
            images = outcome.images_restored,
            removed = removed.items,
            errors = errors.len(),
            "Restore completed"
        );

        Ok(RestoreResult {
            success: true,
            message: RESTORE_SUCCESS_MESSAGE.to_string(),
            items_restored: outcome.items_restored,
            images_restored: outcome.images_restored,
            items_removed: removed.items,
            errors,
        })
    }

    /// Copies one archived image into the asset root under a fresh id.
    ///
    /// Returns `Ok(None)` when the archive has no entry for it.
    fn extract_image<R: Read + Seek>(
        &self,
        reader: &mut ArchiveReader<R>,
        image: &ManifestImage,
    ) -> Result<Option<RestoredImage>> {
        let id = Uuid::new_v4();
        let dest = asset_path(&self.uploads_dir, &format!("{id}_{}", image.filename))
            .map_err(|e| Error::Validation(format!("{e:#}")))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&dest)
            .map_err(|e| Error::io(format!("creating {}", dest.display()), e))?;

        let copied = reader.copy_image(&image.filename, &mut file);
        drop(file);

        match copied {
            Ok(Some(bytes)) => {
                debug!(filename = %image.filename, bytes, "Restored image");
                Ok(Some(RestoredImage {
                    id,
                    filename: image.filename.clone(),
                    file_path: dest,
                    created_at: image.created_at,
                }))
            },
            Ok(None) => {
                remove_files(std::slice::from_ref(&dest));
                Ok(None)
            },
            Err(e) => {
                remove_files(std::slice::from_ref(&dest));
                Err(e)
            },
        }
    }
}

/// Best-effort removal; failures are logged, never reported.
fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
        }
    }
}
