//! Tests for backup and restore orchestration.

use super::*;
use crate::error::Error;
use crate::inventory::{BackupStatus, CompletedBackup, InventoryRecord, ItemDetails, OwnerId};
use anyhow::Result;
use std::io::Write;
use tempfile::TempDir;
use uuid::Uuid;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

struct Fixture {
    dir: TempDir,
    service: BackupService,
}

impl Fixture {
    fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let service = BackupService::new(
            InventoryStore::memory()?,
            dir.path().join("uploads"),
            dir.path().join("backups"),
        )?;
        Ok(Self { dir, service })
    }

    /// Adds an item whose images are written to the asset root first.
    fn add_item(
        &self,
        owner: OwnerId,
        details: &ItemDetails,
        images: &[(&str, &[u8])],
    ) -> Result<InventoryRecord> {
        let store = self.service.store();
        let item = store.insert_item(owner, details)?;
        for (filename, bytes) in images {
            let path = self.service.uploads_dir().join(filename);
            std::fs::write(&path, bytes)?;
            store.insert_image(item.id, filename, &path)?;
        }
        Ok(item)
    }

    fn items(&self, owner: OwnerId) -> Result<Vec<InventoryRecord>> {
        self.service.store().items_for_owner(owner)
    }

    /// Registers a hand-built archive as a completed backup of `owner`.
    fn register_archive(&self, owner: OwnerId, manifest: &str, images: &[(&str, &[u8])]) -> Result<Uuid> {
        let path = self.dir.path().join("crafted.zip");
        let mut zip = ZipWriter::new(std::fs::File::create(&path)?);
        zip.start_file("data.json", SimpleFileOptions::default())?;
        zip.write_all(manifest.as_bytes())?;
        for (name, bytes) in images {
            zip.start_file(format!("images/{name}"), SimpleFileOptions::default())?;
            zip.write_all(bytes)?;
        }
        zip.finish()?;

        let store = self.service.store();
        let record = store.create_backup_record(owner)?;
        store.complete_backup(
            record.id,
            &CompletedBackup {
                filename: "crafted.zip".into(),
                size_bytes: std::fs::metadata(&path)?.len(),
                file_path: path,
                item_count: 1,
                image_count: 0,
            },
        )?;
        Ok(record.id)
    }
}

fn owner() -> OwnerId {
    OwnerId::new(Uuid::new_v4())
}

fn detailed(name: &str) -> ItemDetails {
    let mut details = ItemDetails::named(name, "Electronics", "Office");
    details.brand = Some("Acme".into());
    details.serial_number = Some(format!("SN-{name}"));
    details.purchase_price = Some(120.25);
    details.purchase_date = Some(chrono::Utc::now() - chrono::Duration::days(400));
    details
        .custom_fields
        .insert("warranty_provider".into(), serde_json::json!({"name": "CoverAll", "years": 3}));
    details
}

// =============================================================================
// Backup
// =============================================================================

#[test]
fn test_backup_and_restore_scenario() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();

    let camera = fx.add_item(owner, &detailed("Camera"), &[("cam1.jpg", b"c1"), ("cam2.jpg", b"c2")])?;
    fx.add_item(owner, &detailed("Laptop"), &[("laptop.jpg", b"lp")])?;
    fx.add_item(owner, &detailed("Monitor"), &[("monitor.jpg", b"mn")])?;

    // One of the camera's images loses its backing file
    std::fs::remove_file(fx.service.uploads_dir().join("cam2.jpg"))?;

    let record = fx.service.create_backup(owner)?;
    assert_eq!(record.status, BackupStatus::Completed);
    assert_eq!(record.item_count, Some(3));
    assert_eq!(record.image_count, Some(3));
    let path = record.file_path.clone().unwrap();
    assert!(path.is_file());
    assert_eq!(record.size_bytes, Some(std::fs::metadata(&path)?.len()));
    assert!(path.starts_with(fx.service.backups_dir()));

    let result = fx.service.restore_backup(owner, record.id)?;
    assert!(result.success);
    assert_eq!(result.message, RESTORE_SUCCESS_MESSAGE);
    assert_eq!(result.items_restored, 3);
    assert_eq!(result.images_restored, 3);
    assert_eq!(result.items_removed, 3);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let restored = fx.items(owner)?;
    assert_eq!(restored.len(), 3);
    let camera_restored = restored
        .iter()
        .find(|i| i.details.name == "Camera")
        .unwrap();
    assert_ne!(camera_restored.id, camera.id);
    assert_eq!(camera_restored.details, camera.details);
    assert_eq!(camera_restored.created_at, camera.created_at);
    assert_eq!(camera_restored.images.len(), 1);
    let image = &camera_restored.images[0];
    assert_eq!(image.filename, "cam1.jpg");
    assert_eq!(std::fs::read(&image.file_path)?, b"c1");

    // The replaced items' files are gone
    assert!(!fx.service.uploads_dir().join("cam1.jpg").exists());

    Ok(())
}

#[test]
fn test_shared_filename_with_missing_file_is_skipped() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();

    fx.add_item(owner, &detailed("Bookshelf"), &[("shelf.jpg", b"aaa")])?;
    let cabinet = fx.service.store().insert_item(owner, &detailed("Cabinet"))?;
    let missing = fx.service.uploads_dir().join("gone").join("shelf.jpg");
    fx.service.store().insert_image(cabinet.id, "shelf.jpg", &missing)?;

    let record = fx.service.create_backup(owner)?;
    assert_eq!(record.item_count, Some(2));
    assert_eq!(record.image_count, Some(1));

    let result = fx.service.restore_backup(owner, record.id)?;
    assert_eq!(result.images_restored, 1);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let restored = fx.items(owner)?;
    let shelf = restored.iter().find(|i| i.details.name == "Bookshelf").unwrap();
    let cabinet = restored.iter().find(|i| i.details.name == "Cabinet").unwrap();
    assert_eq!(shelf.images.len(), 1);
    assert_eq!(std::fs::read(&shelf.images[0].file_path)?, b"aaa");
    assert!(cabinet.images.is_empty());
    Ok(())
}

#[test]
fn test_backup_of_empty_inventory() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();

    let record = fx.service.create_backup(owner)?;
    assert_eq!(record.item_count, Some(0));
    assert_eq!(record.image_count, Some(0));
    assert_eq!(fx.service.list_backups(owner)?.len(), 1);
    Ok(())
}

#[test]
fn test_backup_failure_settles_record_as_failed() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Tablet"), &[])?;

    // Replace the backup root with a plain file so staging cannot be created
    let backups = fx.service.backups_dir().to_path_buf();
    std::fs::remove_dir_all(&backups)?;
    std::fs::write(&backups, b"not a directory")?;

    let (backup_id, reason) = match fx.service.create_backup(owner) {
        Err(Error::BackupFailed { backup_id, reason }) => (backup_id, reason),
        other => panic!("expected BackupFailed, got {other:?}"),
    };
    assert!(reason.contains("staging"));

    let record = fx
        .service
        .get_backup(owner, backup_id.parse()?)?;
    assert_eq!(record.status, BackupStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some(reason.as_str()));
    assert!(fx.service.list_backups(owner)?.is_empty());
    Ok(())
}

#[test]
fn test_staging_directory_is_removed() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Router"), &[("router.jpg", b"r")])?;

    fx.service.create_backup(owner)?;

    let leftovers: Vec<_> = std::fs::read_dir(fx.service.backups_dir())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn test_concurrent_owner_backups_are_independent() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Speaker"), &[])?;

    let first = fx.service.create_backup(owner)?;
    let second = fx.service.create_backup(owner)?;

    assert_ne!(first.filename, second.filename);
    assert!(first.file_path.as_ref().unwrap().is_file());
    assert!(second.file_path.as_ref().unwrap().is_file());

    let listed = fx.service.list_backups(owner)?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    Ok(())
}

// =============================================================================
// Restore
// =============================================================================

#[test]
fn test_restore_replaces_and_spares_other_owners() -> Result<()> {
    let fx = Fixture::new()?;
    let (alice, bob) = (owner(), owner());

    fx.add_item(alice, &detailed("Piano"), &[])?;
    fx.add_item(bob, &detailed("Guitar"), &[("guitar.jpg", b"g")])?;
    let backup = fx.service.create_backup(alice)?;

    fx.add_item(alice, &detailed("Drum"), &[])?;
    fx.add_item(alice, &detailed("Flute"), &[])?;

    let result = fx.service.restore_backup(alice, backup.id)?;
    assert_eq!(result.items_removed, 3);
    assert_eq!(result.items_restored, 1);

    let names: Vec<_> = fx.items(alice)?.into_iter().map(|i| i.details.name).collect();
    assert_eq!(names, vec!["Piano"]);

    let bob_items = fx.items(bob)?;
    assert_eq!(bob_items.len(), 1);
    assert!(bob_items[0].images[0].file_path.is_file());
    Ok(())
}

#[test]
fn test_restore_foreign_backup_is_not_found() -> Result<()> {
    let fx = Fixture::new()?;
    let (alice, bob) = (owner(), owner());

    fx.add_item(alice, &detailed("Bike"), &[])?;
    fx.add_item(bob, &detailed("Skates"), &[])?;
    let backup = fx.service.create_backup(alice)?;

    let err = fx.service.restore_backup(bob, backup.id).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.to_string(), "backup not found");

    assert_eq!(fx.items(bob)?.len(), 1);
    assert_eq!(fx.items(alice)?.len(), 1);
    Ok(())
}

#[test]
fn test_restore_unknown_id_is_not_found() -> Result<()> {
    let fx = Fixture::new()?;
    let err = fx.service.restore_backup(owner(), Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    Ok(())
}

#[test]
fn test_restore_missing_artifact_keeps_inventory() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Kettle"), &[])?;
    let backup = fx.service.create_backup(owner)?;

    std::fs::remove_file(backup.file_path.as_ref().unwrap())?;

    let err = fx.service.restore_backup(owner, backup.id).unwrap_err();
    assert!(matches!(err, Error::ArtifactMissing { .. }));
    assert_eq!(fx.items(owner)?.len(), 1);
    Ok(())
}

#[test]
fn test_restore_malformed_archive_keeps_inventory() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Toaster"), &[])?;
    let backup = fx.service.create_backup(owner)?;

    std::fs::write(backup.file_path.as_ref().unwrap(), b"definitely not a zip")?;

    let err = fx.service.restore_backup(owner, backup.id).unwrap_err();
    assert!(matches!(err, Error::MalformedArchive(_)));
    assert_eq!(err.status_code(), 422);
    assert_eq!(fx.items(owner)?.len(), 1);
    Ok(())
}

#[test]
fn test_restore_reports_image_absent_from_archive() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    let manifest = r#"{
        "version": "1.0",
        "created_at": "2024-05-01T10:00:00",
        "items": [{
            "id": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
            "name": "Vase", "category": "Decor", "location": "Hall",
            "brand": null, "model_number": null, "serial_number": null,
            "purchase_date": null, "purchase_price": null, "current_value": 40.0,
            "warranty_expiration": null, "notes": "fragile", "custom_fields": {},
            "created_at": "2024-05-01T10:00:00", "updated_at": "2024-05-01T10:00:00",
            "images": [
                {"id": "9b2504e0-4f89-11d3-9a0c-0305e82c3301", "filename": "vase.jpg",
                 "created_at": "2024-05-01T10:00:00"},
                {"id": "9b2504e0-4f89-11d3-9a0c-0305e82c3302", "filename": "base.jpg",
                 "created_at": "2024-05-01T10:00:00"}
            ]
        }]
    }"#;
    let backup_id = fx.register_archive(owner, manifest, &[("base.jpg", b"b")])?;

    let result = fx.service.restore_backup(owner, backup_id)?;
    assert_eq!(result.items_restored, 1);
    assert_eq!(result.images_restored, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("vase.jpg"));

    let items = fx.items(owner)?;
    assert_eq!(items[0].details.notes.as_deref(), Some("fragile"));
    assert_eq!(items[0].images.len(), 1);
    assert_eq!(items[0].images[0].filename, "base.jpg");
    Ok(())
}

#[test]
fn test_restore_continues_past_malformed_item() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    let manifest = r#"{
        "version": "1.0",
        "created_at": "2024-05-01T10:00:00Z",
        "items": [
            {"id": "3f2504e0-4f89-11d3-9a0c-0305e82c3301", "name": "Clock",
             "category": "Decor", "location": "Hall",
             "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-01T10:00:00Z"},
            {"id": "3f2504e0-4f89-11d3-9a0c-0305e82c3302", "name": "Mirror",
             "category": "Decor", "location": "Hall", "purchase_price": "cheap",
             "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-01T10:00:00Z"}
        ]
    }"#;
    let backup_id = fx.register_archive(owner, manifest, &[])?;

    let result = fx.service.restore_backup(owner, backup_id)?;
    assert_eq!(result.items_restored, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Error restoring item Mirror:"));
    Ok(())
}

#[test]
fn test_restore_rejects_traversal_filenames() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    let manifest = r#"{
        "version": "1.0",
        "items": [{
            "id": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
            "name": "Rug", "category": "Decor", "location": "Hall",
            "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-01T10:00:00Z",
            "images": [{"id": "9b2504e0-4f89-11d3-9a0c-0305e82c3301",
                        "filename": "../../escape.jpg", "created_at": "2024-05-01T10:00:00Z"}]
        }]
    }"#;
    let backup_id = fx.register_archive(owner, manifest, &[])?;

    let result = fx.service.restore_backup(owner, backup_id)?;
    assert_eq!(result.items_restored, 1);
    assert_eq!(result.images_restored, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(!fx.dir.path().join("escape.jpg").exists());
    Ok(())
}

#[test]
fn test_restore_unsupported_version_is_malformed() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Fan"), &[])?;
    let backup_id = fx.register_archive(owner, r#"{"version":"9.9","items":[]}"#, &[])?;

    let err = fx.service.restore_backup(owner, backup_id).unwrap_err();
    assert!(matches!(err, Error::MalformedArchive(_)));
    assert_eq!(fx.items(owner)?.len(), 1);
    Ok(())
}

#[test]
fn test_restore_of_failed_backup_is_not_found() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    let record = fx.service.store().create_backup_record(owner)?;
    fx.service.store().fail_backup(record.id, "disk full")?;

    let err = fx.service.restore_backup(owner, record.id).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    Ok(())
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_delete_removes_file_and_record() -> Result<()> {
    let fx = Fixture::new()?;
    let (alice, bob) = (owner(), owner());
    let backup = fx.service.create_backup(alice)?;
    let path = backup.file_path.clone().unwrap();

    let err = fx.service.delete_backup(bob, backup.id).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(path.is_file());

    fx.service.delete_backup(alice, backup.id)?;
    assert!(!path.exists());
    assert!(fx.service.list_backups(alice)?.is_empty());

    let err = fx.service.delete_backup(alice, backup.id).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    Ok(())
}

#[test]
fn test_delete_tolerates_missing_file() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    let backup = fx.service.create_backup(owner)?;
    std::fs::remove_file(backup.file_path.as_ref().unwrap())?;

    fx.service.delete_backup(owner, backup.id)?;
    assert!(fx.service.list_backups(owner)?.is_empty());
    Ok(())
}

#[test]
fn test_download_locates_artifact() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Watch"), &[("watch.jpg", b"w")])?;
    let backup = fx.service.create_backup(owner)?;

    let download = fx.service.download_backup(owner, backup.id)?;
    assert_eq!(Some(download.filename.as_str()), backup.filename.as_deref());
    assert_eq!(Some(&download.path), backup.file_path.as_ref());
    assert!(download.path.is_file());

    assert!(matches!(
        fx.service.download_backup(OwnerId::new(Uuid::new_v4()), backup.id),
        Err(Error::NotFound { .. })
    ));

    std::fs::remove_file(backup.file_path.as_ref().unwrap())?;
    assert!(matches!(
        fx.service.download_backup(owner, backup.id),
        Err(Error::ArtifactMissing { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_async_wrappers() -> Result<()> {
    let fx = Fixture::new()?;
    let owner = owner();
    fx.add_item(owner, &detailed("Phone"), &[("phone.jpg", b"p")])?;

    let backup = fx.service.create_backup_async(owner).await?;
    assert_eq!(fx.service.list_backups_async(owner).await?.len(), 1);

    let result = fx.service.restore_backup_async(owner, backup.id).await?;
    assert_eq!(result.items_restored, 1);
    assert_eq!(result.images_restored, 1);

    let download = fx.service.download_backup_async(owner, backup.id).await?;
    assert!(std::fs::metadata(&download.path)?.len() > 0);

    fx.service.delete_backup_async(owner, backup.id).await?;
    assert!(fx.service.list_backups_async(owner).await?.is_empty());
    Ok(())
}
