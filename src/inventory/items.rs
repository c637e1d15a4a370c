//! Inventory record and image asset operations.
//!
//! Item CRUD beyond what backup and restore need lives outside this crate;
//! only loading, owner-scoped deletion and inserts are provided here.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, Transaction, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::types::{
    DeletedItems, ImageAsset, InventoryRecord, ItemDetails, ItemInsertFailure, OwnerId,
    RestoreInsertOutcome, RestoredItem,
};
use super::{InventoryStore, conversion_error, opt_ts_col, ts_col, ts_to_sql, uuid_col};

const SELECT_ITEMS: &str = "SELECT id, owner_id, name, category, location, brand, model_number, \
     serial_number, purchase_date, purchase_price, current_value, warranty_expiration, notes, \
     custom_fields, created_at, updated_at FROM items WHERE owner_id = ?1 \
     ORDER BY created_at, id";

const SELECT_OWNER_IMAGES: &str = "SELECT img.id, img.item_id, img.filename, img.file_path, \
     img.created_at FROM item_images img JOIN items it ON it.id = img.item_id \
     WHERE it.owner_id = ?1 ORDER BY img.created_at, img.id";

impl InventoryStore {
    /// Inserts a new item for `owner` with a fresh id and current timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be inserted.
    pub fn insert_item(&self, owner: OwnerId, details: &ItemDetails) -> Result<InventoryRecord> {
        let now = Utc::now();
        let record = InventoryRecord {
            id: Uuid::new_v4(),
            owner_id: owner,
            details: details.clone(),
            created_at: now,
            updated_at: now,
            images: Vec::new(),
        };

        let conn = self.conn.lock();
        insert_item_row(&conn, &record.id, owner, details, &now, &now)
            .with_context(|| format!("Failed to insert item '{}'", details.name))?;

        Ok(record)
    }

    /// Attaches an image row to an existing item.
    ///
    /// The file at `file_path` is not touched; callers write it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the item does not exist or the row cannot be inserted.
    pub fn insert_image(&self, item_id: Uuid, filename: &str, file_path: &Path) -> Result<ImageAsset> {
        let image = ImageAsset {
            id: Uuid::new_v4(),
            item_id,
            filename: filename.to_string(),
            file_path: file_path.to_path_buf(),
            created_at: Utc::now(),
        };

        let conn = self.conn.lock();
        insert_image_row(
            &conn,
            &image.id,
            &item_id,
            &image.filename,
            &image.file_path,
            &image.created_at,
        )
        .with_context(|| format!("Failed to insert image '{filename}' for item {item_id}"))?;

        Ok(image)
    }

    /// Loads every item owned by `owner`, each with its image list.
    ///
    /// Items are ordered by creation time so repeated loads produce the same
    /// manifest order. Reads see the database's normal read consistency; no
    /// lock is taken against concurrent item mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn items_for_owner(&self, owner: OwnerId) -> Result<Vec<InventoryRecord>> {
        let conn = self.conn.lock();
        let owner_text = owner.to_string();

        let mut images: HashMap<Uuid, Vec<ImageAsset>> = HashMap::new();
        {
            let mut stmt = conn
                .prepare(SELECT_OWNER_IMAGES)
                .context("Failed to prepare image query")?;
            let rows = stmt
                .query_map(params![owner_text], image_from_row)
                .context("Failed to query images")?;
            for row in rows {
                let image = row.context("Failed to read image row")?;
                images.entry(image.item_id).or_default().push(image);
            }
        }

        let mut stmt = conn
            .prepare(SELECT_ITEMS)
            .context("Failed to prepare item query")?;
        let rows = stmt
            .query_map(params![owner_text], item_from_row)
            .context("Failed to query items")?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row.context("Failed to read item row")?;
            record.images = images.remove(&record.id).unwrap_or_default();
            records.push(record);
        }

        Ok(records)
    }

    /// Counts the items owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_items(&self, owner: OwnerId) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM items WHERE owner_id = ?1",
                params![owner.to_string()],
                |row| row.get(0),
            )
            .context("Failed to count items")?;
        u64::try_from(count).context("Negative item count")
    }

    /// Deletes every item owned by `owner`; image rows go by cascade.
    ///
    /// Returns the removed image rows so the caller can clean up their files.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is deleted then.
    pub fn delete_items_for_owner(&self, owner: OwnerId) -> Result<DeletedItems> {
        let mut conn = self.conn.lock();
        let owner_text = owner.to_string();

        let tx = conn
            .transaction()
            .context("Failed to begin delete transaction")?;

        let images = {
            let mut stmt = tx
                .prepare(SELECT_OWNER_IMAGES)
                .context("Failed to prepare image query")?;
            let rows = stmt
                .query_map(params![owner_text], image_from_row)
                .context("Failed to query images")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read image row")?
        };

        let items = tx
            .execute("DELETE FROM items WHERE owner_id = ?1", params![owner_text])
            .context("Failed to delete items")?;

        tx.commit().context("Failed to commit delete transaction")?;

        Ok(DeletedItems {
            items: items as u64,
            images,
        })
    }

    /// Inserts restored items in a single transaction.
    ///
    /// Each item and its images go under their own savepoint: an item whose
    /// rows fail is rolled back, reported in the outcome, and the remaining
    /// items still commit together.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or committed;
    /// nothing is inserted then.
    pub fn insert_restored(
        &self,
        owner: OwnerId,
        items: Vec<RestoredItem>,
    ) -> Result<RestoreInsertOutcome> {
        let mut conn = self.conn.lock();
        let mut tx = conn
            .transaction()
            .context("Failed to begin restore transaction")?;

        let mut outcome = RestoreInsertOutcome::default();
        for item in items {
            match insert_restored_item(&mut tx, owner, &item) {
                Ok(()) => {
                    outcome.items_restored += 1;
                    outcome.images_restored += item.images.len() as u64;
                },
                // The caller removes `orphaned_files`; this store never touches files.
                Err(e) => outcome.failures.push(ItemInsertFailure {
                    label: item.label.clone(),
                    reason: format!("{e:#}"),
                    orphaned_files: item.images.iter().map(|i| i.file_path.clone()).collect(),
                }),
            }
        }

        tx.commit().context("Failed to commit restore transaction")?;

        Ok(outcome)
    }
}

fn insert_restored_item(tx: &mut Transaction<'_>, owner: OwnerId, item: &RestoredItem) -> Result<()> {
    let sp = tx.savepoint().context("Failed to create savepoint")?;

    insert_item_row(
        &sp,
        &item.id,
        owner,
        &item.details,
        &item.created_at,
        &item.updated_at,
    )
    .context("Failed to insert item row")?;

    for image in &item.images {
        insert_image_row(
            &sp,
            &image.id,
            &item.id,
            &image.filename,
            &image.file_path,
            &image.created_at,
        )
        .with_context(|| format!("Failed to insert image '{}'", image.filename))?;
    }

    sp.commit().context("Failed to release savepoint")?;
    Ok(())
}

fn insert_item_row(
    conn: &Connection,
    id: &Uuid,
    owner: OwnerId,
    details: &ItemDetails,
    created_at: &DateTime<Utc>,
    updated_at: &DateTime<Utc>,
) -> Result<()> {
    let custom_fields =
        serde_json::to_string(&details.custom_fields).context("Failed to encode custom fields")?;

    conn.execute(
        "INSERT INTO items (id, owner_id, name, category, location, brand, model_number, \
         serial_number, purchase_date, purchase_price, current_value, warranty_expiration, \
         notes, custom_fields, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            id.to_string(),
            owner.to_string(),
            details.name,
            details.category,
            details.location,
            details.brand,
            details.model_number,
            details.serial_number,
            details.purchase_date.as_ref().map(ts_to_sql),
            details.purchase_price,
            details.current_value,
            details.warranty_expiration.as_ref().map(ts_to_sql),
            details.notes,
            custom_fields,
            ts_to_sql(created_at),
            ts_to_sql(updated_at),
        ],
    )?;

    Ok(())
}

fn insert_image_row(
    conn: &Connection,
    id: &Uuid,
    item_id: &Uuid,
    filename: &str,
    file_path: &Path,
    created_at: &DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO item_images (id, item_id, filename, file_path, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.to_string(),
            item_id.to_string(),
            filename,
            file_path.to_string_lossy(),
            ts_to_sql(created_at),
        ],
    )?;

    Ok(())
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryRecord> {
    let owner = uuid_col(row, 1)?;
    let custom_fields: String = row.get(13)?;
    let custom_fields = serde_json::from_str(&custom_fields).map_err(|e| conversion_error(13, e))?;

    Ok(InventoryRecord {
        id: uuid_col(row, 0)?,
        owner_id: OwnerId::new(owner),
        details: ItemDetails {
            name: row.get(2)?,
            category: row.get(3)?,
            location: row.get(4)?,
            brand: row.get(5)?,
            model_number: row.get(6)?,
            serial_number: row.get(7)?,
            purchase_date: opt_ts_col(row, 8)?,
            purchase_price: row.get(9)?,
            current_value: row.get(10)?,
            warranty_expiration: opt_ts_col(row, 11)?,
            notes: row.get(12)?,
            custom_fields,
        },
        created_at: ts_col(row, 14)?,
        updated_at: ts_col(row, 15)?,
        images: Vec::new(),
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageAsset> {
    let file_path: String = row.get(3)?;
    Ok(ImageAsset {
        id: uuid_col(row, 0)?,
        item_id: uuid_col(row, 1)?,
        filename: row.get(2)?,
        file_path: PathBuf::from(file_path),
        created_at: ts_col(row, 4)?,
    })
}
