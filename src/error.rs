//! Error types for backup and restore operations.
//!
//! Lower layers (the SQLite store, filesystem helpers) report failures as
//! `anyhow::Error` with context; the orchestrators convert them into this
//! taxonomy at their boundary so callers can branch on the kind of failure.

use std::path::PathBuf;

/// Result type for backup and restore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Backup/restore errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Record absent or owned by someone else. Both cases render identically.
    #[error("{what} not found")]
    NotFound { what: &'static str },

    /// Manifest missing, unparseable, or of an unsupported version.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// Status record exists but its artifact file does not.
    #[error("backup file not found at path: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// Backup attempt failed; the status record carries the same reason.
    #[error("failed to create backup: {reason}")]
    BackupFailed { backup_id: String, reason: String },

    /// Restore aborted.
    #[error("error restoring backup: {0}")]
    RestoreFailed(String),

    /// Database collaborator failure.
    #[error("database error: {0:#}")]
    Storage(#[source] anyhow::Error),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal failure outside the taxonomy above (e.g. a panicked worker).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a not-found error for a backup status record.
    pub fn backup_not_found() -> Self {
        Self::NotFound { what: "backup" }
    }

    /// Create a malformed archive error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedArchive(reason.into())
    }

    /// Create a backup failure error.
    pub fn backup_failed(backup_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackupFailed {
            backup_id: backup_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a restore failure error.
    pub fn restore_failed(reason: impl Into<String>) -> Self {
        Self::RestoreFailed(reason.into())
    }

    /// Wrap a database collaborator error.
    pub fn storage(source: anyhow::Error) -> Self {
        Self::Storage(source)
    }
}

impl Error {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::ArtifactMissing { .. } => 404,
            Self::Validation(_) => 400,
            Self::MalformedArchive(_) => 422,
            Self::Storage(_) => 503,
            Self::BackupFailed { .. }
            | Self::RestoreFailed(_)
            | Self::Io { .. }
            | Self::Config(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Short machine-friendly name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::MalformedArchive(_) => "malformed_archive",
            Self::ArtifactMissing { .. } => "artifact_missing",
            Self::BackupFailed { .. } => "backup_failed",
            Self::RestoreFailed(_) => "restore_failed",
            Self::Storage(_) => "storage",
            Self::Io { .. } => "io",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}
