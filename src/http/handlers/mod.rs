//! HTTP API handlers.

mod backups;

pub(crate) use backups::{
    backup_create, backup_delete, backup_download, backup_list, backup_restore,
};

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use subtle::ConstantTimeEq;

use super::audit::{AuditEvent, log_audit_event};
use super::{AppError, AppState};
use crate::inventory::OwnerId;

/// GET /api/health - Liveness check.
pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics - Prometheus text exposition, 404 when no recorder is set.
pub(crate) async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Resolves the caller's owner identity from gateway-supplied headers.
///
/// When an API key is configured the request must carry
/// `Authorization: Bearer <key>`; the key is compared in constant time.
pub(crate) fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
) -> Result<OwnerId, AppError> {
    if let Some(expected) = &state.auth.api_key {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        let accepted = provided
            .is_some_and(|key| bool::from(key.as_bytes().ct_eq(expected.as_bytes())));
        if !accepted {
            let reason = if provided.is_some() {
                "invalid gateway credential"
            } else {
                "missing gateway credential"
            };
            log_audit_event(AuditEvent::AuthFailure {
                path: path.to_string(),
                reason: reason.to_string(),
            });
            return Err(AppError::Unauthorized("Not authenticated".to_string()));
        }
    }

    let Some(raw) = headers.get(&state.auth.owner_header) else {
        log_audit_event(AuditEvent::OwnerRejected {
            path: path.to_string(),
            reason: "missing owner header".to_string(),
        });
        return Err(AppError::Unauthorized("Not authenticated".to_string()));
    };

    raw.to_str()
        .ok()
        .and_then(|v| v.parse::<OwnerId>().ok())
        .ok_or_else(|| {
            log_audit_event(AuditEvent::OwnerRejected {
                path: path.to_string(),
                reason: "owner header is not a valid id".to_string(),
            });
            AppError::Unauthorized("Invalid owner identity".to_string())
        })
}
