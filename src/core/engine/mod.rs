#![allow(clippy::result_large_err)] // Engine operations return AppError to preserve structured diagnostic context.

//! Workflow engine: the only writer of task status, approval sub-state, and
//! assignment lifecycles.
//!
//! Every operation is a short-lived unit of work: load the owned
//! document(s), validate the transition against current state and the
//! permission oracle, persist the mutation, then append audit and fire
//! notifications. Audit and notification failures are logged and swallowed;
//! they never roll back a committed transition.

pub mod approval;
pub mod assignment;
pub mod pool;

use crate::core::audit::{AuditRecord, AuditSink, EntityKind};
use crate::core::config::{ForemanConfig, MIN_REJECTION_REASON_CHARS};
use crate::core::directory::ActorDirectory;
use crate::core::entities::{
    ActorId, Assignment, AssignmentId, NewTask, Task, TaskId,
};
use crate::core::error::AppError;
use crate::core::notify::{
    ActionTaken, Notification, NotificationKind, NotificationMeta, NotificationSink,
};
use crate::core::permissions::PermissionOracle;
use crate::core::store::{StoreError, WorkflowStore};
use crate::core::types::{ApprovalStatus, AssignmentStatus, ErrorCategory, Operation, TaskStatus};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Behavior knobs derived from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Minimum rejection/dispute reason length, in characters.
    pub min_rejection_reason_chars: usize,
    /// Whether claimants silently dropped by `approve_claim(keep_in_pool =
    /// false)` receive an explicit notification.
    pub notify_dropped_claims: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_rejection_reason_chars: MIN_REJECTION_REASON_CHARS,
            notify_dropped_claims: true,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &ForemanConfig) -> Self {
        Self {
            min_rejection_reason_chars: config.validation.min_rejection_reason_chars,
            notify_dropped_claims: config.pool.notify_dropped_claims,
        }
    }
}

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    oracle: Arc<dyn PermissionOracle>,
    directory: Arc<dyn ActorDirectory>,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    settings: EngineSettings,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        oracle: Arc<dyn PermissionOracle>,
        directory: Arc<dyn ActorDirectory>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            oracle,
            directory,
            notifications,
            audit,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ---- shared plumbing -------------------------------------------------

    pub(crate) fn store_failure(err: StoreError) -> AppError {
        AppError::with_source(
            ErrorCategory::StoreUnavailable,
            "document store operation failed",
            Box::new(err),
        )
        .with_code("WF-STORE-001")
    }

    pub(crate) async fn load_task(&self, id: TaskId) -> Result<Task, AppError> {
        self.store
            .get_task(id)
            .await
            .map_err(Self::store_failure)?
            .ok_or_else(|| {
                let mut err = AppError::new(ErrorCategory::NotFound, "task not found")
                    .with_code("WF-TASK-001");
                err.add_context("task_id", &id.to_string());
                err
            })
    }

    pub(crate) async fn load_assignment(&self, id: AssignmentId) -> Result<Assignment, AppError> {
        self.store
            .get_assignment(id)
            .await
            .map_err(Self::store_failure)?
            .ok_or_else(|| {
                let mut err = AppError::new(ErrorCategory::NotFound, "assignment not found")
                    .with_code("WF-ASSIGN-001");
                err.add_context("assignment_id", &id.to_string());
                err
            })
    }

    /// Consult the oracle. A `false` answer and an oracle failure both deny:
    /// permission checks fail closed.
    pub(crate) async fn check_permission(
        &self,
        actor: ActorId,
        task: &Task,
        operation: Operation,
    ) -> Result<(), AppError> {
        let allowed = match self.oracle.can_perform(actor, task, operation).await {
            Ok(allowed) => allowed,
            Err(err) => {
                return Err(AppError::with_source(
                    ErrorCategory::PermissionDenied,
                    format!("permission oracle failed while checking {}", operation),
                    Box::new(err),
                )
                .with_code("WF-PERM-002"));
            }
        };
        if !allowed {
            let mut err = AppError::new(
                ErrorCategory::PermissionDenied,
                format!("actor may not perform {}", operation),
            )
            .with_code("WF-PERM-001");
            err.add_context("actor", &actor.to_string());
            err.add_context("task_id", &task.id.to_string());
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn snapshot<T: Serialize>(value: &T) -> Value {
        serde_json::to_value(value).unwrap_or(Value::Null)
    }

    /// Append an audit record. Failures are logged for reconciliation and
    /// otherwise discarded.
    pub(crate) async fn record_audit(&self, record: AuditRecord) {
        if let Err(err) = self.audit.record(record).await {
            tracing::warn!("audit sink unavailable, transition not recorded: {}", err);
        }
    }

    /// Deliver a notification, discarding sink failures.
    pub(crate) async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifications.deliver(notification).await {
            tracing::warn!("notification delivery failed: {}", err);
        }
    }

    /// Deliver unless the recipient already has an unread notification of
    /// this kind for the task. A failed probe falls through to delivery.
    pub(crate) async fn notify_deduped(&self, notification: Notification) {
        match self
            .notifications
            .has_unread(
                notification.recipient,
                notification.task_id,
                notification.kind,
            )
            .await
        {
            Ok(true) => {
                tracing::debug!(
                    "suppressed duplicate {:?} notification for task {}",
                    notification.kind,
                    notification.task_id
                );
            }
            Ok(false) => self.notify(notification).await,
            Err(err) => {
                tracing::warn!("unread probe failed, delivering anyway: {}", err);
                self.notify(notification).await;
            }
        }
    }

    pub(crate) async fn mark_notification_actioned(
        &self,
        recipient: ActorId,
        task_id: TaskId,
        kind: NotificationKind,
        taken: ActionTaken,
    ) {
        if let Err(err) = self
            .notifications
            .mark_actioned(recipient, task_id, kind, taken)
            .await
        {
            tracing::warn!("could not update notification in place: {}", err);
        }
    }

    pub(crate) async fn team_leads_or_empty(&self, task_id: TaskId) -> Vec<ActorId> {
        match self.directory.team_leads(task_id).await {
            Ok(leads) => leads,
            Err(err) => {
                tracing::warn!("team lead lookup failed, skipping lead notifications: {}", err);
                Vec::new()
            }
        }
    }

    pub(crate) async fn all_actors_or_empty(&self) -> Vec<ActorId> {
        match self.directory.all_actors().await {
            Ok(actors) => actors,
            Err(err) => {
                tracing::warn!("actor roster lookup failed, skipping broadcast: {}", err);
                Vec::new()
            }
        }
    }

    /// Actors holding a non-rejected assignment on the task.
    pub(crate) async fn non_rejected_assignees(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<ActorId>, AppError> {
        let assignments = self
            .store
            .assignments_for_task(task_id)
            .await
            .map_err(Self::store_failure)?;
        let mut assignees = Vec::new();
        for assignment in assignments {
            if assignment.status != AssignmentStatus::Rejected
                && !assignees.contains(&assignment.assignee)
            {
                assignees.push(assignment.assignee);
            }
        }
        Ok(assignees)
    }

    // ---- task lifecycle --------------------------------------------------

    /// Create a task in `pending` with an empty approval gate.
    pub async fn create_task(&self, input: NewTask) -> Result<Task, AppError> {
        if input.title.trim().is_empty() {
            return Err(
                AppError::new(ErrorCategory::ValidationError, "task title cannot be empty")
                    .with_code("WF-TASK-002"),
            );
        }

        let task = Task::new(input, Utc::now());
        self.store
            .insert_task(task.clone())
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "task.created",
            EntityKind::Task,
            task.id,
            task.created_by,
            Value::Null,
            Self::snapshot(&task),
        ))
        .await;

        tracing::info!("task {} created by {}", task.id, task.created_by);
        Ok(task)
    }

    /// Change a task's status.
    ///
    /// Setting the current status again succeeds without appending history,
    /// auditing, or notifying: "status set" and "status changed" are
    /// distinct. The only transition rules enforced here are the approval
    /// couplings; everything else is the permission oracle's call.
    pub async fn update_status(
        &self,
        task_id: TaskId,
        new_status: TaskStatus,
        actor: ActorId,
    ) -> Result<Task, AppError> {
        let mut task = self.load_task(task_id).await?;
        self.check_permission(actor, &task, Operation::UpdateStatus)
            .await?;

        if task.status == new_status {
            return Ok(task);
        }

        if task.approval_status == ApprovalStatus::Approved {
            return Err(AppError::new(
                ErrorCategory::InvalidState,
                "an approved task is completed; its status can no longer change",
            )
            .with_code("WF-TASK-004"));
        }

        if new_status == TaskStatus::Completed {
            if task.approval_status == ApprovalStatus::Pending {
                return Err(AppError::new(
                    ErrorCategory::InvalidState,
                    "an approval decision is pending; completion goes through the approval gate",
                )
                .with_code("WF-TASK-003"));
            }
            let assignments = self
                .store
                .assignments_for_task(task_id)
                .await
                .map_err(Self::store_failure)?;
            if !assignments.is_empty() {
                return Err(AppError::new(
                    ErrorCategory::InvalidState,
                    "an assigned task is completed through the approval gate, not a direct status write",
                )
                .with_code("WF-TASK-003"));
            }
        }

        let before = Self::snapshot(&task);
        let old_status = task.status;
        task.record_status(new_status, actor, Utc::now());
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "task.status_changed",
            EntityKind::Task,
            task.id,
            actor,
            before,
            Self::snapshot(&task),
        ))
        .await;

        let mut recipients = Vec::new();
        if task.created_by != actor {
            recipients.push(task.created_by);
        }
        for assignee in self.non_rejected_assignees(task_id).await? {
            if assignee != actor && !recipients.contains(&assignee) {
                recipients.push(assignee);
            }
        }
        for recipient in recipients {
            self.notify(Notification::new(
                recipient,
                NotificationKind::StatusChanged,
                format!("\"{}\" is now {}", task.title, new_status),
                format!(
                    "Status of \"{}\" changed from {} to {}",
                    task.title, old_status, new_status
                ),
                task.id,
                NotificationMeta::StatusChanged {
                    old_status,
                    new_status,
                    changed_by: actor,
                },
            ))
            .await;
        }

        tracing::info!(
            "task {} status changed from {} to {} by {}",
            task.id,
            old_status,
            new_status,
            actor
        );
        Ok(task)
    }

    /// Remove an actor from a task: their assignments are deleted and the
    /// membership mirror updated. Removing an actor who holds nothing is an
    /// idempotent success.
    pub async fn remove_assignee(
        &self,
        task_id: TaskId,
        target: ActorId,
        actor: ActorId,
    ) -> Result<(), AppError> {
        let mut task = self.load_task(task_id).await?;
        self.check_permission(actor, &task, Operation::RemoveAssignee)
            .await?;

        let assignments = self
            .store
            .assignments_for_task(task_id)
            .await
            .map_err(Self::store_failure)?;
        let mut removed_any = false;
        for assignment in assignments
            .into_iter()
            .filter(|a| a.assignee == target)
        {
            self.store
                .delete_assignment(assignment.id)
                .await
                .map_err(Self::store_failure)?;
            removed_any = true;
            self.record_audit(AuditRecord::new(
                "assignment.removed",
                EntityKind::Assignment,
                assignment.id,
                actor,
                Self::snapshot(&assignment),
                Value::Null,
            ))
            .await;
        }

        let was_member = task.assigned_users.shift_remove(&target);
        if was_member {
            task.updated_at = Utc::now();
            self.store
                .update_task(&task)
                .await
                .map_err(Self::store_failure)?;
        }

        if removed_any || was_member {
            self.notify(Notification::new(
                target,
                NotificationKind::RemovedFromTask,
                format!("Removed from \"{}\"", task.title),
                format!("You were removed from \"{}\"", task.title),
                task.id,
                NotificationMeta::Removed { removed_by: actor },
            ))
            .await;
            tracing::info!("actor {} removed from task {} by {}", target, task.id, actor);
        }

        Ok(())
    }

    /// Hard-delete a task. Assignments are deleted first so the parent is
    /// never removed while dependents remain.
    pub async fn delete_task(&self, task_id: TaskId, actor: ActorId) -> Result<(), AppError> {
        let task = self.load_task(task_id).await?;
        self.check_permission(actor, &task, Operation::DeleteTask)
            .await?;

        let removed = self
            .store
            .delete_assignments_for_task(task_id)
            .await
            .map_err(Self::store_failure)?;
        self.store
            .delete_task(task_id)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "task.deleted",
            EntityKind::Task,
            task.id,
            actor,
            Self::snapshot(&task),
            Value::Null,
        ))
        .await;

        tracing::info!(
            "task {} deleted by {} ({} assignments cascaded)",
            task_id,
            actor,
            removed
        );
        Ok(())
    }
}
