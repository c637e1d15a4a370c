//! Backup service handlers.
//!
//! Every handler resolves the owner first, then awaits the whole operation;
//! a backup or restore request returns only once it has settled.

use axum::{
    Json,
    body::Body,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde_json::{Value, json};
use std::io;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::super::audit::{AuditEvent, log_audit_event};
use super::super::{AppError, AppState};
use super::authenticate;
use crate::backup::RestoreResult;
use crate::constants::ARCHIVE_CONTENT_TYPE;
use crate::inventory::BackupStatusRecord;
use crate::metrics;

/// Unparseable ids are reported exactly like unknown ones.
fn parse_backup_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Backup(crate::Error::backup_not_found()))
}

/// POST /api/backups - Create a backup of the caller's inventory.
pub(crate) async fn backup_create(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<BackupStatusRecord>, AppError> {
    metrics::record_http_operation("create");
    let owner = authenticate(&state, &headers, uri.path())?;
    let record = state.service.create_backup_async(owner).await?;
    Ok(Json(record))
}

/// GET /api/backups - List the caller's completed backups, newest first.
pub(crate) async fn backup_list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    metrics::record_http_operation("list");
    let owner = authenticate(&state, &headers, uri.path())?;
    let backups = state.service.list_backups_async(owner).await?;
    Ok(Json(json!({ "backups": backups })))
}

/// POST /api/backups/{id}/restore - Replace the caller's inventory.
pub(crate) async fn backup_restore(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RestoreResult>, AppError> {
    metrics::record_http_operation("restore");
    let owner = authenticate(&state, &headers, uri.path())?;
    let backup_id = parse_backup_id(&id)?;

    let result = state.service.restore_backup_async(owner, backup_id).await?;
    log_audit_event(AuditEvent::RestorePerformed {
        owner,
        backup_id,
        items_removed: result.items_removed,
        items_restored: result.items_restored,
    });

    Ok(Json(result))
}

/// DELETE /api/backups/{id} - Delete a backup and its archive.
pub(crate) async fn backup_delete(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    metrics::record_http_operation("delete");
    let owner = authenticate(&state, &headers, uri.path())?;
    let backup_id = parse_backup_id(&id)?;

    state.service.delete_backup_async(owner, backup_id).await?;
    log_audit_event(AuditEvent::BackupDeleted { owner, backup_id });

    Ok(Json(json!({ "message": "Backup deleted successfully" })))
}

/// GET /api/backups/{id}/download - Stream the archive as an attachment.
pub(crate) async fn backup_download(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    metrics::record_http_operation("download");
    let owner = authenticate(&state, &headers, uri.path())?;
    let backup_id = parse_backup_id(&id)?;

    let download = state.service.download_backup_async(owner, backup_id).await?;
    let file = File::open(&download.path).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            crate::Error::ArtifactMissing {
                path: download.path.clone(),
            }
        } else {
            crate::Error::io(format!("opening backup file {}", download.path.display()), e)
        }
    })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.filename.replace(['"', '\\'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}
