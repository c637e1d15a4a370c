//! Type definitions for the inventory store.
//!
//! Contains the inventory record, image asset and backup status record
//! structures shared by the store, the archive codec and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of an already-authenticated owner.
///
/// Every backup and restore operation takes one explicitly; nothing in this
/// crate reads the current user from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OwnerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for OwnerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Descriptive, monetary and temporal fields of an item.
///
/// This is exactly the set of fields a restore copies verbatim from an
/// archive, so it is kept as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub name: String,
    pub category: String,
    pub location: String,
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub purchase_price: Option<f64>,
    pub current_value: Option<f64>,
    pub warranty_expiration: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Open-ended key/value extension map for integration-specific data.
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

impl ItemDetails {
    /// Details with only the required fields set.
    pub fn named(
        name: impl Into<String>,
        category: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            location: location.into(),
            brand: None,
            model_number: None,
            serial_number: None,
            purchase_date: None,
            purchase_price: None,
            current_value: None,
            warranty_expiration: None,
            notes: None,
            custom_fields: serde_json::Map::new(),
        }
    }
}

/// One tracked possession.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub details: ItemDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub images: Vec<ImageAsset>,
}

/// A binary file attached to exactly one inventory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: Uuid,
    pub item_id: Uuid,
    pub filename: String,
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a backup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    InProgress,
    Completed,
    Failed,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => anyhow::bail!("unknown backup status '{other}'"),
        }
    }
}

/// Audit row tracking one backup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStatusRecord {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub filename: Option<String>,
    pub file_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
    pub item_count: Option<u64>,
    pub image_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub status: BackupStatus,
    pub error_message: Option<String>,
}

impl BackupStatusRecord {
    /// Whether every field a listing needs is populated.
    ///
    /// Records stranded `in_progress` by a crash, and failed attempts, are
    /// kept for audit but never listed.
    pub fn is_listable(&self) -> bool {
        self.filename.is_some()
            && self.file_path.is_some()
            && self.size_bytes.is_some()
            && self.item_count.is_some()
            && self.image_count.is_some()
    }
}

/// Fields written when a backup attempt completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedBackup {
    pub filename: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub item_count: u64,
    pub image_count: u64,
}

/// An item ready to be inserted by a restore, with freshly assigned ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredItem {
    pub id: Uuid,
    /// Human-readable label for error reporting (usually the item name).
    pub label: String,
    pub details: ItemDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub images: Vec<RestoredImage>,
}

/// An image already copied into the live asset root, awaiting its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredImage {
    pub id: Uuid,
    pub filename: String,
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Items removed by a destructive replace.
#[derive(Debug, Default)]
pub struct DeletedItems {
    pub items: u64,
    /// Image rows removed by cascade; their files still exist on disk.
    pub images: Vec<ImageAsset>,
}

/// Outcome of inserting restored items in one transaction.
#[derive(Debug, Default)]
pub struct RestoreInsertOutcome {
    pub items_restored: u64,
    pub images_restored: u64,
    pub failures: Vec<ItemInsertFailure>,
}

/// A restored item whose rows could not be inserted.
#[derive(Debug)]
pub struct ItemInsertFailure {
    pub label: String,
    pub reason: String,
    /// Files copied for this item that no row references.
    pub orphaned_files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_parse_and_display() {
        let raw = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";
        let owner: OwnerId = raw.parse().unwrap();
        assert_eq!(owner.to_string(), raw);
        assert!("not-a-uuid".parse::<OwnerId>().is_err());
    }

    #[test]
    fn test_backup_status_round_trip() {
        for status in [
            BackupStatus::InProgress,
            BackupStatus::Completed,
            BackupStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<BackupStatus>().unwrap(), status);
        }
        assert!("done".parse::<BackupStatus>().is_err());
        assert!(!BackupStatus::InProgress.is_terminal());
        assert!(BackupStatus::Failed.is_terminal());
    }

    #[test]
    fn test_backup_status_serializes_snake_case() {
        let json = serde_json::to_string(&BackupStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_listable_requires_all_fields() {
        let mut record = BackupStatusRecord {
            id: Uuid::new_v4(),
            owner_id: OwnerId::new(Uuid::new_v4()),
            filename: Some("backup.zip".to_string()),
            file_path: Some(PathBuf::from("/tmp/backup.zip")),
            size_bytes: Some(10),
            item_count: Some(0),
            image_count: Some(0),
            created_at: Utc::now(),
            status: BackupStatus::Completed,
            error_message: None,
        };
        assert!(record.is_listable());

        record.image_count = None;
        assert!(!record.is_listable());
    }
}
