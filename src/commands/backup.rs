//! `whis backup` - operate on one owner's backups without the HTTP server.

use anyhow::{Context, Result};
use std::path::PathBuf;
use whis::backup::BackupService;
use whis::inventory::BackupStatusRecord;
use whis::utils::format_bytes;

use super::{init_tracing, load_config};
use crate::BackupAction;

/// Execute a backup management command.
pub fn execute(
    config_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    action: BackupAction,
) -> Result<()> {
    let config = load_config(config_path.as_deref(), data_dir)?;
    init_tracing(&config.logging);

    let paths = config.storage.resolve()?;
    let service = BackupService::open(&paths).context("Failed to open storage")?;

    match action {
        BackupAction::Create { owner } => {
            let record = service.create_backup(owner)?;
            println!("Backup created");
            print_record(&record);
        },
        BackupAction::List { owner } => {
            let backups = service.list_backups(owner)?;
            if backups.is_empty() {
                println!("No backups for {owner}.");
                return Ok(());
            }
            println!("Backups for {owner}");
            println!("{}", "=".repeat(48));
            for record in &backups {
                println!();
                print_record(record);
            }
        },
        BackupAction::Restore { owner, id } => {
            let result = service.restore_backup(owner, id)?;
            println!("{}", result.message);
            println!("  Items removed:   {}", result.items_removed);
            println!("  Items restored:  {}", result.items_restored);
            println!("  Images restored: {}", result.images_restored);
            if !result.errors.is_empty() {
                println!();
                println!("{} problem(s) during restore:", result.errors.len());
                for error in &result.errors {
                    println!("  - {error}");
                }
            }
        },
        BackupAction::Delete { owner, id } => {
            service.delete_backup(owner, id)?;
            println!("Backup {id} deleted");
        },
    }

    Ok(())
}

fn print_record(record: &BackupStatusRecord) {
    println!("ID:       {}", record.id);
    println!("Created:  {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(filename) = &record.filename {
        println!("File:     {filename}");
    }
    if let Some(size) = record.size_bytes {
        println!("Size:     {}", format_bytes(size));
    }
    println!(
        "Contents: {} items, {} images",
        record.item_count.unwrap_or(0),
        record.image_count.unwrap_or(0)
    );
}
