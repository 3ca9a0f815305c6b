//! In-memory notification feed with unread tracking.

use super::{ActionTaken, Notification, NotificationKind, NotificationSink, NotifyError};
use crate::core::entities::{ActorId, TaskId};
use async_trait::async_trait;
use std::sync::Mutex;

/// One feed entry: the delivered notification plus its read state.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub notification: Notification,
    pub read: bool,
    pub action_taken: Option<ActionTaken>,
}

/// Stores every delivered notification. Backs tests and acts as a reference
/// implementation of the dedup and mark-actioned semantics.
#[derive(Default)]
pub struct MemoryNotificationSink {
    entries: Mutex<Vec<FeedEntry>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, in delivery order.
    pub fn entries(&self) -> Vec<FeedEntry> {
        self.entries.lock().expect("feed lock poisoned").clone()
    }

    /// Entries delivered to one recipient, in delivery order.
    pub fn for_recipient(&self, recipient: ActorId) -> Vec<FeedEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.notification.recipient == recipient)
            .collect()
    }

    pub fn count_for(&self, recipient: ActorId, kind: NotificationKind) -> usize {
        self.for_recipient(recipient)
            .iter()
            .filter(|entry| entry.notification.kind == kind)
            .count()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.entries
            .lock()
            .map_err(|_| NotifyError::Unavailable("feed lock poisoned".to_string()))?
            .push(FeedEntry {
                notification,
                read: false,
                action_taken: None,
            });
        Ok(())
    }

    async fn has_unread(
        &self,
        recipient: ActorId,
        task_id: TaskId,
        kind: NotificationKind,
    ) -> Result<bool, NotifyError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| NotifyError::Unavailable("feed lock poisoned".to_string()))?;
        Ok(entries.iter().any(|entry| {
            !entry.read
                && entry.notification.recipient == recipient
                && entry.notification.task_id == task_id
                && entry.notification.kind == kind
        }))
    }

    async fn mark_actioned(
        &self,
        recipient: ActorId,
        task_id: TaskId,
        kind: NotificationKind,
        taken: ActionTaken,
    ) -> Result<(), NotifyError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| NotifyError::Unavailable("feed lock poisoned".to_string()))?;
        for entry in entries.iter_mut() {
            if !entry.read
                && entry.notification.recipient == recipient
                && entry.notification.task_id == task_id
                && entry.notification.kind == kind
            {
                entry.read = true;
                entry.action_taken = Some(taken);
            }
        }
        Ok(())
    }
}
