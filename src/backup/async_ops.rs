//! Async wrappers for backup operations.
//!
//! These methods wrap the synchronous operations in `spawn_blocking` to
//! avoid blocking the async runtime. Use these when calling from async
//! contexts (HTTP handlers, etc.). The caller still waits for the whole
//! operation; nothing is deferred.

use tokio::task::JoinError;
use uuid::Uuid;

use super::{BackupService, Download, RestoreResult};
use crate::error::{Error, Result};
use crate::inventory::{BackupStatusRecord, OwnerId};

fn join_error(e: JoinError) -> Error {
    Error::Internal(format!("Task join error: {e}"))
}

impl BackupService {
    /// Async version of `create_backup` that uses `spawn_blocking`.
    pub async fn create_backup_async(&self, owner: OwnerId) -> Result<BackupStatusRecord> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.create_backup(owner))
            .await
            .map_err(join_error)?
    }

    /// Async version of `list_backups` that uses `spawn_blocking`.
    pub async fn list_backups_async(&self, owner: OwnerId) -> Result<Vec<BackupStatusRecord>> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.list_backups(owner))
            .await
            .map_err(join_error)?
    }

    /// Async version of `restore_backup` that uses `spawn_blocking`.
    pub async fn restore_backup_async(
        &self,
        owner: OwnerId,
        backup_id: Uuid,
    ) -> Result<RestoreResult> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.restore_backup(owner, backup_id))
            .await
            .map_err(join_error)?
    }

    /// Async version of `delete_backup` that uses `spawn_blocking`.
    pub async fn delete_backup_async(&self, owner: OwnerId, backup_id: Uuid) -> Result<()> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.delete_backup(owner, backup_id))
            .await
            .map_err(join_error)?
    }

    /// Async version of `download_backup` that uses `spawn_blocking`.
    pub async fn download_backup_async(&self, owner: OwnerId, backup_id: Uuid) -> Result<Download> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.download_backup(owner, backup_id))
            .await
            .map_err(join_error)?
    }
}
