//! Approval gate: the second-stage sign-off that turns a worked task into a
//! completed one.

use super::WorkflowEngine;
use crate::core::audit::{AuditRecord, EntityKind};
use crate::core::entities::{ActorId, Task, TaskId};
use crate::core::error::AppError;
use crate::core::notify::{Notification, NotificationKind, NotificationMeta};
use crate::core::store::WorkflowStore;
use crate::core::types::{ApprovalStatus, AssignmentStatus, ErrorCategory, Operation, TaskStatus};
use chrono::Utc;

impl WorkflowEngine {
    /// Ask the creator to sign off on a worked task.
    ///
    /// Requesting while a request is already pending is a successful no-op
    /// with no duplicate notification. A previously rejected gate may be
    /// re-entered after rework; an approved gate may not. An accepted
    /// assignee may always request; any other actor needs the oracle's
    /// grant for the operation.
    pub async fn request_approval(
        &self,
        task_id: TaskId,
        actor: ActorId,
    ) -> Result<Task, AppError> {
        let mut task = self.load_task(task_id).await?;

        match task.approval_status {
            ApprovalStatus::Pending => return Ok(task),
            ApprovalStatus::Approved => {
                return Err(AppError::new(
                    ErrorCategory::InvalidState,
                    "task is already approved",
                )
                .with_code("WF-APPROVAL-002"));
            }
            ApprovalStatus::None | ApprovalStatus::Rejected => {}
        }

        if !matches!(task.status, TaskStatus::InProgress | TaskStatus::Completed) {
            let mut err = AppError::new(
                ErrorCategory::InvalidState,
                "approval can only be requested on a task that has been worked",
            )
            .with_code("WF-APPROVAL-001");
            err.add_context("status", task.status.as_str());
            return Err(err);
        }

        let assignments = self
            .store
            .assignments_for_task(task_id)
            .await
            .map_err(Self::store_failure)?;
        let holds_accepted = assignments
            .iter()
            .any(|a| a.assignee == actor && a.status == AssignmentStatus::Accepted);
        if !holds_accepted {
            self.check_permission(actor, &task, Operation::RequestApproval)
                .await
                .map_err(|mut err| {
                    err.add_context("accepted_assignment", "none held by actor");
                    err
                })?;
        }

        let before = Self::snapshot(&task);
        task.enter_approval_gate(actor, Utc::now());
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "approval.requested",
            EntityKind::Task,
            task.id,
            actor,
            before,
            Self::snapshot(&task),
        ))
        .await;

        if task.created_by != actor {
            self.notify_deduped(Notification::new(
                task.created_by,
                NotificationKind::ApprovalRequested,
                format!("Approval requested for \"{}\"", task.title),
                format!("\"{}\" is ready for your review", task.title),
                task.id,
                NotificationMeta::ApprovalRequested { requested_by: actor },
            ))
            .await;
        }

        tracing::info!("approval requested for task {} by {}", task.id, actor);
        Ok(task)
    }

    /// Approve a pending request: the gate closes and the task completes in
    /// the same document write. Accepted assignments then complete as well.
    pub async fn approve(&self, task_id: TaskId, approver: ActorId) -> Result<Task, AppError> {
        let mut task = self.load_task(task_id).await?;
        self.check_permission(approver, &task, Operation::DecideApproval)
            .await?;
        Self::require_pending_gate(&task)?;

        let before = Self::snapshot(&task);
        task.grant_approval(approver, Utc::now());
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "approval.approved",
            EntityKind::Task,
            task.id,
            approver,
            before,
            Self::snapshot(&task),
        ))
        .await;

        // Follower writes after the authoritative task transition. A
        // straggler here is a reconciliation case, not a failed approval.
        let assignments = match self.store.assignments_for_task(task_id).await {
            Ok(assignments) => assignments,
            Err(err) => {
                tracing::warn!("could not list assignments after approval: {}", err);
                Vec::new()
            }
        };
        let mut accepted_assignees = Vec::new();
        for mut assignment in assignments {
            if assignment.status != AssignmentStatus::Accepted {
                continue;
            }
            accepted_assignees.push(assignment.assignee);
            let assignment_before = Self::snapshot(&assignment);
            assignment.complete(Utc::now());
            if let Err(err) = self.store.update_assignment(&assignment).await {
                tracing::warn!(
                    "assignment {} not marked completed after approval: {}",
                    assignment.id,
                    err
                );
                continue;
            }
            self.record_audit(AuditRecord::new(
                "assignment.completed",
                EntityKind::Assignment,
                assignment.id,
                approver,
                assignment_before,
                Self::snapshot(&assignment),
            ))
            .await;
        }

        self.notify_gate_decision(&task, approver, true, None, &accepted_assignees)
            .await;

        tracing::info!("task {} approved by {}", task.id, approver);
        Ok(task)
    }

    /// Reject a pending request: the gate records the refusal and the task
    /// returns to in-progress in the same document write.
    pub async fn reject_approval(
        &self,
        task_id: TaskId,
        approver: ActorId,
        reason: Option<String>,
    ) -> Result<Task, AppError> {
        let mut task = self.load_task(task_id).await?;
        self.check_permission(approver, &task, Operation::DecideApproval)
            .await?;
        Self::require_pending_gate(&task)?;

        let before = Self::snapshot(&task);
        task.deny_approval(approver, reason.clone(), Utc::now());
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "approval.rejected",
            EntityKind::Task,
            task.id,
            approver,
            before,
            Self::snapshot(&task),
        ))
        .await;

        let accepted_assignees: Vec<ActorId> = match self.store.assignments_for_task(task_id).await
        {
            Ok(assignments) => assignments
                .iter()
                .filter(|a| a.status == AssignmentStatus::Accepted)
                .map(|a| a.assignee)
                .collect(),
            Err(err) => {
                tracing::warn!("could not list assignments after gate rejection: {}", err);
                Vec::new()
            }
        };

        self.notify_gate_decision(&task, approver, false, reason, &accepted_assignees)
            .await;

        tracing::info!("approval for task {} rejected by {}", task.id, approver);
        Ok(task)
    }

    fn require_pending_gate(task: &Task) -> Result<(), AppError> {
        if task.approval_status != ApprovalStatus::Pending {
            let mut err = AppError::new(
                ErrorCategory::InvalidState,
                "no approval request is pending on this task",
            )
            .with_code("WF-APPROVAL-003");
            err.add_context("approval_status", task.approval_status.as_str());
            return Err(err);
        }
        Ok(())
    }

    /// Notify the requester and every accepted assignee of a gate decision,
    /// suppressing duplicates per unread notification.
    async fn notify_gate_decision(
        &self,
        task: &Task,
        approver: ActorId,
        approved: bool,
        reason: Option<String>,
        accepted_assignees: &[ActorId],
    ) {
        let kind = if approved {
            NotificationKind::TaskApproved
        } else {
            NotificationKind::ApprovalRejected
        };
        let title = if approved {
            format!("\"{}\" was approved", task.title)
        } else {
            format!("Approval declined for \"{}\"", task.title)
        };
        let body = match (&reason, approved) {
            (_, true) => format!("\"{}\" was approved and completed", task.title),
            (Some(reason), false) => {
                format!("\"{}\" needs more work: {}", task.title, reason)
            }
            (None, false) => format!("\"{}\" was sent back for more work", task.title),
        };

        let mut recipients = Vec::new();
        if let Some(requester) = task.approval_requested_by {
            if requester != approver {
                recipients.push(requester);
            }
        }
        for assignee in accepted_assignees {
            if *assignee != approver && !recipients.contains(assignee) {
                recipients.push(*assignee);
            }
        }

        for recipient in recipients {
            self.notify_deduped(Notification::new(
                recipient,
                kind,
                title.clone(),
                body.clone(),
                task.id,
                NotificationMeta::ApprovalDecided {
                    decided_by: approver,
                    approved,
                    reason: reason.clone(),
                },
            ))
            .await;
        }
    }
}
