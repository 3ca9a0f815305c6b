//! Notification fan-out contract.
//!
//! Delivery is best-effort: the engine logs and discards sink failures and
//! never rolls back a transition because a notification could not be sent.
//! Deduplication is keyed on `(recipient, task, kind, unread)`; accepting an
//! assignment updates the outstanding "you were assigned" notification in
//! place instead of producing a duplicate.

pub mod memory;

pub use memory::MemoryNotificationSink;

use crate::core::entities::{ActorId, TaskId};
use crate::core::types::TaskStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Notification kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    AssignmentAccepted,
    AssignmentRejected,
    RejectionUpheld,
    RejectionOverturned,
    ApprovalRequested,
    TaskApproved,
    ApprovalRejected,
    StatusChanged,
    PooledTaskAvailable,
    PoolClaimRequested,
    PoolClaimApproved,
    PoolClaimRejected,
    PoolClaimDropped,
    RemovedFromTask,
}

/// Action a recipient took on a notification, recorded in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    Accepted,
    Rejected,
}

/// Structured metadata attached to a notification. One variant per kind of
/// payload; exhaustive so downstream consumers can match without falling
/// back to untyped maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationMeta {
    Assigned {
        assigned_by: ActorId,
    },
    AssignmentAccepted {
        assignee: ActorId,
    },
    AssignmentRejected {
        assignee: ActorId,
        reason: String,
    },
    RejectionUpheld {
        arbitrated_by: ActorId,
    },
    RejectionOverturned {
        arbitrated_by: ActorId,
        note: String,
    },
    ApprovalRequested {
        requested_by: ActorId,
    },
    ApprovalDecided {
        decided_by: ActorId,
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    StatusChanged {
        old_status: TaskStatus,
        new_status: TaskStatus,
        changed_by: ActorId,
    },
    PoolBroadcast {
        added_by: ActorId,
    },
    ClaimRequested {
        claimant: ActorId,
    },
    ClaimDecided {
        claimant: ActorId,
        approved: bool,
        decided_by: ActorId,
    },
    ClaimDropped {
        decided_by: ActorId,
    },
    Removed {
        removed_by: ActorId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: ActorId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub task_id: TaskId,
    pub metadata: NotificationMeta,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: ActorId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        task_id: TaskId,
        metadata: NotificationMeta,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            kind,
            title: title.into(),
            body: body.into(),
            task_id,
            metadata,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver to the recipient's feed (and whatever secondary channels the
    /// sink manages, e.g. best-effort email).
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;

    /// Dedup probe: does the recipient already have an unread notification
    /// of this kind for the task?
    async fn has_unread(
        &self,
        recipient: ActorId,
        task_id: TaskId,
        kind: NotificationKind,
    ) -> Result<bool, NotifyError>;

    /// Mark matching unread notifications read and tag the action the
    /// recipient took, instead of delivering a duplicate.
    async fn mark_actioned(
        &self,
        recipient: ActorId,
        task_id: TaskId,
        kind: NotificationKind,
        taken: ActionTaken,
    ) -> Result<(), NotifyError>;
}
