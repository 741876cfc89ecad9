/// Moderation event bus
///
/// Every moderation write (role change, ban, report transition, deletion)
/// is published here so realtime consumers can refresh their views.
use crate::admin::{ReportStatus, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by moderation writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ModerationEvent {
    #[serde(rename_all = "camelCase")]
    RoleGranted { user_id: String, role: Role, granted_by: String },
    #[serde(rename_all = "camelCase")]
    RoleRevoked { user_id: String, role: Role, revoked_by: String },
    #[serde(rename_all = "camelCase")]
    AccountBanned { user_id: String, reason: String, banned_by: String },
    #[serde(rename_all = "camelCase")]
    AccountUnbanned { user_id: String, unbanned_by: String },
    #[serde(rename_all = "camelCase")]
    ReportStatusChanged { report_id: String, status: ReportStatus, reviewed_by: String },
    #[serde(rename_all = "camelCase")]
    EmailBanned { email: String, banned_by: String },
    #[serde(rename_all = "camelCase")]
    EmailUnbanned { id: String, unbanned_by: String },
    #[serde(rename_all = "camelCase")]
    AccountDeleted { user_id: String, deleted_by: String },
}

/// Broadcast channel for moderation events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ModerationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: ModerationEvent) {
        match self.tx.send(event) {
            Ok(receivers) => tracing::trace!("Moderation event delivered to {} subscriber(s)", receivers),
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!("No subscribers for moderation event {:?}", event)
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModerationEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
