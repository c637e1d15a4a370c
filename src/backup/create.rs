//! Backup orchestration: status record, snapshot, archive, completion.

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::BufWriter;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use super::BackupService;
use super::archive::{self, FsAssetResolver};
use crate::error::{Error, Result};
use crate::inventory::{BackupStatusRecord, CompletedBackup, OwnerId};
use crate::metrics;

/// Prefix of the per-backup staging directory inside the backup root.
const STAGING_PREFIX: &str = ".staging-";

/// Artifact filename: owner, second-granularity timestamp, record id.
///
/// The record id suffix keeps two backups of one owner within the same
/// second from colliding.
pub(crate) fn artifact_filename(owner: OwnerId, at: DateTime<Utc>, backup_id: Uuid) -> String {
    format!(
        "backup_{owner}_{}_{backup_id}.zip",
        at.format("%Y%m%d_%H%M%S")
    )
}

impl BackupService {
    /// Creates a backup of every item `owner` has.
    ///
    /// A status record is inserted `in_progress` before any filesystem work,
    /// then settled exactly once: `completed` with filename, path, size and
    /// counts, or `failed` with the cause. The returned record is always
    /// `completed`.
    ///
    /// # Errors
    ///
    /// - [`Error::Storage`] if the status record cannot be inserted
    /// - [`Error::BackupFailed`] if anything after that fails; the status
    ///   record carries the same reason
    pub fn create_backup(&self, owner: OwnerId) -> Result<BackupStatusRecord> {
        let span = info_span!("create_backup", %owner);
        let _enter = span.enter();

        let record = self
            .store
            .create_backup_record(owner)
            .map_err(Error::storage)?;
        let backup_id = record.id;
        info!(%backup_id, "Backup started");

        let done = match self.write_archive(owner, &record) {
            Ok(done) => done,
            Err(e) => return self.settle_failed(backup_id, format!("{e:#}")),
        };

        match self.store.complete_backup(backup_id, &done) {
            Ok(record) => {
                info!(
                    %backup_id,
                    filename = %done.filename,
                    items = done.item_count,
                    images = done.image_count,
                    size_bytes = done.size_bytes,
                    "Backup completed"
                );
                metrics::record_backup("completed");
                Ok(record)
            },
            Err(e) => {
                if let Err(rm) = fs::remove_file(&done.file_path) {
                    warn!(path = %done.file_path.display(), error = %rm, "Failed to remove unrecorded artifact");
                }
                self.settle_failed(backup_id, format!("{e:#}"))
            },
        }
    }

    /// Loads the snapshot, encodes it in a staging directory and moves the
    /// artifact into the backup root.
    ///
    /// The staging directory is removed when this returns, on every path.
    fn write_archive(
        &self,
        owner: OwnerId,
        record: &BackupStatusRecord,
    ) -> anyhow::Result<CompletedBackup> {
        let records = self
            .store
            .items_for_owner(owner)
            .context("Failed to load inventory")?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.backups_dir)
            .with_context(|| {
                format!(
                    "Failed to create staging directory in {}",
                    self.backups_dir.display()
                )
            })?;

        let filename = artifact_filename(owner, record.created_at, record.id);
        let staged = staging.path().join(&filename);

        let file = File::create(&staged)
            .with_context(|| format!("Failed to create {}", staged.display()))?;
        let mut writer = BufWriter::new(file);
        let summary = archive::encode(&mut writer, &records, &FsAssetResolver)?;
        let file = writer
            .into_inner()
            .context("Failed to flush archive")?;
        file.sync_all().context("Failed to sync archive")?;
        drop(file);

        if summary.skipped_images > 0 {
            warn!(
                backup_id = %record.id,
                skipped = summary.skipped_images,
                "Images without a backing file were left out"
            );
        }

        let file_path = self.backups_dir.join(&filename);
        fs::rename(&staged, &file_path)
            .with_context(|| format!("Failed to move archive to {}", file_path.display()))?;
        let size_bytes = fs::metadata(&file_path)
            .with_context(|| format!("Failed to stat {}", file_path.display()))?
            .len();

        Ok(CompletedBackup {
            filename,
            file_path,
            size_bytes,
            item_count: summary.item_count,
            image_count: summary.image_count,
        })
    }

    fn settle_failed(&self, backup_id: Uuid, reason: String) -> Result<BackupStatusRecord> {
        error!(%backup_id, error = %reason, "Backup failed");
        if let Err(e) = self.store.fail_backup(backup_id, &reason) {
            error!(%backup_id, error = %format!("{e:#}"), "Failed to record backup failure");
        }
        metrics::record_backup("failed");
        Err(Error::backup_failed(backup_id.to_string(), reason))
    }
}
