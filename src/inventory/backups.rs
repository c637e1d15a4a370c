//! Backup status record operations.
//!
//! A record is written `in_progress` before any archive work starts and
//! moves exactly once to `completed` or `failed`. The guarded updates below
//! refuse any other transition.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use std::path::PathBuf;
use uuid::Uuid;

use super::types::{BackupStatus, BackupStatusRecord, CompletedBackup, OwnerId};
use super::{InventoryStore, conversion_error, opt_u64_col, ts_col, ts_to_sql, u64_to_sql, uuid_col};

const SELECT_BACKUP: &str = "SELECT id, owner_id, filename, file_path, size_bytes, item_count, \
     image_count, created_at, status, error_message FROM backups";

impl InventoryStore {
    /// Inserts a new `in_progress` record for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be inserted.
    pub fn create_backup_record(&self, owner: OwnerId) -> Result<BackupStatusRecord> {
        let record = BackupStatusRecord {
            id: Uuid::new_v4(),
            owner_id: owner,
            filename: None,
            file_path: None,
            size_bytes: None,
            item_count: None,
            image_count: None,
            created_at: Utc::now(),
            status: BackupStatus::InProgress,
            error_message: None,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO backups (id, owner_id, created_at, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id.to_string(),
                owner.to_string(),
                ts_to_sql(&record.created_at),
                record.status.as_str(),
            ],
        )
        .context("Failed to insert backup record")?;

        Ok(record)
    }

    /// Moves an `in_progress` record to `completed` and fills in its results.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist, is already terminal,
    /// or the update fails.
    pub fn complete_backup(&self, id: Uuid, done: &CompletedBackup) -> Result<BackupStatusRecord> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE backups SET status = ?2, filename = ?3, file_path = ?4, size_bytes = ?5, \
                 item_count = ?6, image_count = ?7, error_message = NULL \
                 WHERE id = ?1 AND status = ?8",
                params![
                    id.to_string(),
                    BackupStatus::Completed.as_str(),
                    done.filename,
                    done.file_path.to_string_lossy(),
                    u64_to_sql(done.size_bytes)?,
                    u64_to_sql(done.item_count)?,
                    u64_to_sql(done.image_count)?,
                    BackupStatus::InProgress.as_str(),
                ],
            )
            .context("Failed to complete backup record")?;

        if updated == 0 {
            bail!("Backup record {id} is not in progress");
        }

        conn.query_row(
            &format!("{SELECT_BACKUP} WHERE id = ?1"),
            params![id.to_string()],
            backup_from_row,
        )
        .context("Failed to reload backup record")
    }

    /// Moves an `in_progress` record to `failed` with a reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist, is already terminal,
    /// or the update fails.
    pub fn fail_backup(&self, id: Uuid, message: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE backups SET status = ?2, error_message = ?3 WHERE id = ?1 AND status = ?4",
                params![
                    id.to_string(),
                    BackupStatus::Failed.as_str(),
                    message,
                    BackupStatus::InProgress.as_str(),
                ],
            )
            .context("Failed to mark backup record failed")?;

        if updated == 0 {
            bail!("Backup record {id} is not in progress");
        }
        Ok(())
    }

    /// Looks up a record by id, visible only to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub fn find_backup(&self, owner: OwnerId, id: Uuid) -> Result<Option<BackupStatusRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{SELECT_BACKUP} WHERE id = ?1 AND owner_id = ?2"),
            params![id.to_string(), owner.to_string()],
            backup_from_row,
        )
        .optional()
        .context("Failed to query backup record")
    }

    /// Owner of a record regardless of who asks. Only used for audit logging.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn backup_owner(&self, id: Uuid) -> Result<Option<OwnerId>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT owner_id FROM backups WHERE id = ?1",
            params![id.to_string()],
            |row| uuid_col(row, 0).map(OwnerId::new),
        )
        .optional()
        .context("Failed to query backup owner")
    }

    /// Lists the owner's fully-populated records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn list_backups(&self, owner: OwnerId) -> Result<Vec<BackupStatusRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_BACKUP} WHERE owner_id = ?1 AND filename IS NOT NULL \
                 AND file_path IS NOT NULL AND size_bytes IS NOT NULL \
                 AND item_count IS NOT NULL AND image_count IS NOT NULL \
                 ORDER BY created_at DESC, id DESC"
            ))
            .context("Failed to prepare backup listing")?;

        let rows = stmt
            .query_map(params![owner.to_string()], backup_from_row)
            .context("Failed to list backups")?;

        let mut records = Vec::new();
        for row in rows {
            let record = row.context("Failed to read backup row")?;
            if record.is_listable() {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Deletes the owner's record; returns false when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_backup_record(&self, owner: OwnerId, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM backups WHERE id = ?1 AND owner_id = ?2",
                params![id.to_string(), owner.to_string()],
            )
            .context("Failed to delete backup record")?;
        Ok(deleted > 0)
    }
}

fn backup_from_row(row: &Row<'_>) -> rusqlite::Result<BackupStatusRecord> {
    let status: String = row.get(8)?;
    let status = status
        .parse::<BackupStatus>()
        .map_err(|e| conversion_error(8, std::io::Error::other(e.to_string())))?;
    let file_path: Option<String> = row.get(3)?;

    Ok(BackupStatusRecord {
        id: uuid_col(row, 0)?,
        owner_id: OwnerId::new(uuid_col(row, 1)?),
        filename: row.get(2)?,
        file_path: file_path.map(PathBuf::from),
        size_bytes: opt_u64_col(row, 4)?,
        item_count: opt_u64_col(row, 5)?,
        image_count: opt_u64_col(row, 6)?,
        created_at: ts_col(row, 7)?,
        status,
        error_message: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId {
        OwnerId::new(Uuid::new_v4())
    }

    fn done(name: &str) -> CompletedBackup {
        CompletedBackup {
            filename: name.to_string(),
            file_path: PathBuf::from(format!("/backups/{name}")),
            size_bytes: 2048,
            item_count: 3,
            image_count: 1,
        }
    }

    #[test]
    fn test_create_then_complete() {
        let store = InventoryStore::memory().unwrap();
        let owner = owner();

        let record = store.create_backup_record(owner).unwrap();
        assert_eq!(record.status, BackupStatus::InProgress);
        assert!(!record.is_listable());

        let completed = store.complete_backup(record.id, &done("a.zip")).unwrap();
        assert_eq!(completed.status, BackupStatus::Completed);
        assert_eq!(completed.size_bytes, Some(2048));
        assert_eq!(completed.created_at, record.created_at);
        assert!(completed.is_listable());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let store = InventoryStore::memory().unwrap();
        let owner = owner();

        let record = store.create_backup_record(owner).unwrap();
        store.fail_backup(record.id, "disk full").unwrap();

        assert!(store.complete_backup(record.id, &done("a.zip")).is_err());
        assert!(store.fail_backup(record.id, "again").is_err());

        let found = store.find_backup(owner, record.id).unwrap().unwrap();
        assert_eq!(found.status, BackupStatus::Failed);
        assert_eq!(found.error_message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_find_is_owner_scoped() {
        let store = InventoryStore::memory().unwrap();
        let (alice, bob) = (owner(), owner());

        let record = store.create_backup_record(alice).unwrap();
        assert!(store.find_backup(alice, record.id).unwrap().is_some());
        assert!(store.find_backup(bob, record.id).unwrap().is_none());
        assert_eq!(store.backup_owner(record.id).unwrap(), Some(alice));
        assert!(!store.delete_backup_record(bob, record.id).unwrap());
        assert!(store.delete_backup_record(alice, record.id).unwrap());
        assert!(store.find_backup(alice, record.id).unwrap().is_none());
    }

    #[test]
    fn test_list_hides_incomplete_and_orders_newest_first() {
        let store = InventoryStore::memory().unwrap();
        let owner = owner();

        let first = store.create_backup_record(owner).unwrap();
        store.complete_backup(first.id, &done("first.zip")).unwrap();

        let failed = store.create_backup_record(owner).unwrap();
        store.fail_backup(failed.id, "boom").unwrap();

        let _stranded = store.create_backup_record(owner).unwrap();

        let second = store.create_backup_record(owner).unwrap();
        store.complete_backup(second.id, &done("second.zip")).unwrap();

        let other = store.create_backup_record(OwnerId::new(Uuid::new_v4())).unwrap();
        store.complete_backup(other.id, &done("other.zip")).unwrap();

        let listed = store.list_backups(owner).unwrap();
        let names: Vec<_> = listed.iter().filter_map(|r| r.filename.as_deref()).collect();
        assert_eq!(names, vec!["second.zip", "first.zip"]);
    }
}
