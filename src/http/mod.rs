//! HTTP API for backup and restore.
//!
//! All routes live under `/api`. The owner of every request is supplied by
//! the fronting authentication gateway in a configurable header; nothing in
//! here reads identity from any other place.
//!
//! # Endpoints
//!
//! - `GET    /api/health`                  - liveness
//! - `POST   /api/backups`                 - create a backup
//! - `GET    /api/backups`                 - list completed backups
//! - `POST   /api/backups/{id}/restore`    - replace inventory from a backup
//! - `DELETE /api/backups/{id}`            - delete a backup
//! - `GET    /api/backups/{id}/download`   - download the archive
//! - `GET    /metrics`                     - Prometheus text, when enabled

mod audit;
mod handlers;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::backup::BackupService;
use crate::config::ServerConfig;

pub use audit::{AuditEvent, log_audit_event};

/// Credentials expected from the fronting gateway.
#[derive(Debug)]
pub(crate) struct GatewayAuth {
    pub(crate) owner_header: HeaderName,
    pub(crate) api_key: Option<String>,
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) service: BackupService,
    pub(crate) auth: Arc<GatewayAuth>,
    pub(crate) metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Builds handler state from the server section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner header is not a valid header name.
    pub fn new(service: BackupService, server: &ServerConfig) -> Result<Self> {
        let owner_header = HeaderName::try_from(server.owner_header.to_ascii_lowercase())
            .with_context(|| format!("Invalid owner header name '{}'", server.owner_header))?;

        Ok(Self {
            service,
            auth: Arc::new(GatewayAuth {
                owner_header,
                api_key: server.api_key.clone(),
            }),
            metrics: None,
        })
    }

    /// Enables `GET /metrics` backed by `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Builds the router with all backup routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/backups",
            post(handlers::backup_create).get(handlers::backup_list),
        )
        .route("/api/backups/{id}", delete(handlers::backup_delete))
        .route("/api/backups/{id}/restore", post(handlers::backup_restore))
        .route("/api/backups/{id}/download", get(handlers::backup_download))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port` and serves until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, "whis listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// =============================================================================
// Error responses
// =============================================================================

/// Handler error rendered as `{"detail": ...}` JSON.
#[derive(Debug)]
pub(crate) enum AppError {
    Unauthorized(String),
    Backup(crate::Error),
}

impl From<crate::Error> for AppError {
    fn from(e: crate::Error) -> Self {
        Self::Backup(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Backup(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    error!(error = %e, kind = e.kind(), "Request failed");
                }
                (status, e.to_string())
            },
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
