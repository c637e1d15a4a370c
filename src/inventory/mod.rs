//! Embedded SQLite store for inventory records and backup status records.
//!
//! This is the relational collaborator the backup and restore orchestrators
//! consume: load-by-owner with eager images, delete-by-owner, bulk insert,
//! and single-row writes for backup status records.
//!
//! # Example
//!
//! ```ignore
//! use whis::inventory::{InventoryStore, ItemDetails};
//!
//! let store = InventoryStore::open("~/.whis/whis.db")?;
//! let item = store.insert_item(owner, &ItemDetails::named("Drill", "Tools", "Garage"))?;
//! let items = store.items_for_owner(owner)?;
//! ```
//!
//! All operations are blocking. Async callers go through
//! [`crate::backup::BackupService`], which moves whole operations onto
//! `spawn_blocking`.

mod backups;
mod items;
mod types;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use types::{
    BackupStatus, BackupStatusRecord, CompletedBackup, DeletedItems, ImageAsset, InventoryRecord,
    ItemDetails, ItemInsertFailure, OwnerId, RestoreInsertOutcome, RestoredImage, RestoredItem,
};

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id                  TEXT PRIMARY KEY,
    owner_id            TEXT NOT NULL,
    name                TEXT NOT NULL,
    category            TEXT NOT NULL,
    location            TEXT NOT NULL,
    brand               TEXT,
    model_number        TEXT,
    serial_number       TEXT,
    purchase_date       TEXT,
    purchase_price      REAL,
    current_value       REAL,
    warranty_expiration TEXT,
    notes               TEXT,
    custom_fields       TEXT NOT NULL DEFAULT '{}',
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_items_owner_id ON items(owner_id);
CREATE INDEX IF NOT EXISTS ix_items_name ON items(name);
CREATE INDEX IF NOT EXISTS ix_items_category ON items(category);
CREATE INDEX IF NOT EXISTS ix_items_location ON items(location);

CREATE TABLE IF NOT EXISTS item_images (
    id          TEXT PRIMARY KEY,
    item_id     TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    filename    TEXT NOT NULL,
    file_path   TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_item_images_item_id ON item_images(item_id);

CREATE TABLE IF NOT EXISTS backups (
    id            TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    filename      TEXT,
    file_path     TEXT,
    size_bytes    INTEGER,
    item_count    INTEGER,
    image_count   INTEGER,
    created_at    TEXT NOT NULL,
    status        TEXT NOT NULL,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS ix_backups_owner_created ON backups(owner_id, created_at);
";

/// SQLite-backed inventory store.
///
/// # Thread Safety
///
/// `InventoryStore` is `Clone` and can be shared across threads. A single
/// connection is serialized behind a mutex; each public method holds it for
/// the duration of one statement or one transaction.
#[derive(Clone)]
pub struct InventoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryStore {
    /// Opens or creates the database at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directory cannot be created
    /// - The database cannot be opened (permissions, corrupt file)
    /// - The schema cannot be applied
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    /// Creates a store backed by an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

// =============================================================================
// Column conversion helpers
// =============================================================================

/// Formats a timestamp for storage.
///
/// Fixed nanosecond precision keeps values lexicographically sortable and
/// lets them round-trip exactly.
pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| conversion_error(idx, e))
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn opt_u64_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    let value: Option<i64> = row.get(idx)?;
    value
        .map(|v| u64::try_from(v).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Converts a count for storage in an INTEGER column.
fn u64_to_sql(value: u64) -> Result<i64> {
    i64::try_from(value).context("Value exceeds SQLite INTEGER range")
}
