//! Security audit logging for backup API events.
//!
//! Events go to the `audit` tracing target so they can be routed separately
//! from request logs.

use tracing::{info, warn};
use uuid::Uuid;

use crate::inventory::OwnerId;

/// Security audit events that should be logged for monitoring and alerting.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    /// Gateway credential missing or wrong
    AuthFailure { path: String, reason: String },
    /// Owner header missing or not a valid owner id
    OwnerRejected { path: String, reason: String },
    /// Destructive replace of an owner's inventory
    RestorePerformed {
        owner: OwnerId,
        backup_id: Uuid,
        items_removed: u64,
        items_restored: u64,
    },
    /// Backup artifact and record removed
    BackupDeleted { owner: OwnerId, backup_id: Uuid },
}

/// Log a security audit event with structured fields.
pub fn log_audit_event(event: AuditEvent) {
    match event {
        AuditEvent::AuthFailure { path, reason } => {
            warn!(
                target: "audit",
                event_type = "auth_failure",
                %path,
                %reason,
                "Authentication failed"
            );
        },
        AuditEvent::OwnerRejected { path, reason } => {
            warn!(
                target: "audit",
                event_type = "owner_rejected",
                %path,
                %reason,
                "Owner identity rejected"
            );
        },
        AuditEvent::RestorePerformed {
            owner,
            backup_id,
            items_removed,
            items_restored,
        } => {
            warn!(
                target: "audit",
                event_type = "restore_performed",
                %owner,
                %backup_id,
                items_removed,
                items_restored,
                "Inventory replaced from backup"
            );
        },
        AuditEvent::BackupDeleted { owner, backup_id } => {
            info!(
                target: "audit",
                event_type = "backup_deleted",
                %owner,
                %backup_id,
                "Backup deleted"
            );
        },
    }
}
