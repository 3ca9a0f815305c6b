//! Assignment lifecycle: assign, accept, reject, and the rejection dispute
//! arbitration that lets the assigner uphold or overturn a rejection.

use super::WorkflowEngine;
use crate::core::audit::{AuditRecord, EntityKind};
use crate::core::entities::{ActorId, Assignment, AssignmentId, Task, TaskId};
use crate::core::error::AppError;
use crate::core::notify::{ActionTaken, Notification, NotificationKind, NotificationMeta};
use crate::core::store::WorkflowStore;
use crate::core::types::{AssignmentStatus, ErrorCategory, Operation, TaskStatus};
use chrono::Utc;
use serde_json::Value;

impl WorkflowEngine {
    pub(crate) fn validate_reason(&self, reason: &str, code: &str) -> Result<(), AppError> {
        let floor = self.settings().min_rejection_reason_chars;
        if reason.chars().count() < floor {
            let mut err = AppError::new(
                ErrorCategory::ValidationError,
                format!("reason must be at least {} characters", floor),
            )
            .with_code(code);
            err.add_context("reason_chars", &reason.chars().count().to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Create a pending assignment binding `assignee` to the task.
    ///
    /// Refused while the assignee already holds an active assignment or a
    /// rejected one still awaiting arbitration; a released (upheld) or
    /// completed assignment does not block a fresh one.
    pub async fn assign(
        &self,
        task_id: TaskId,
        assignee: ActorId,
        assigned_by: ActorId,
    ) -> Result<Assignment, AppError> {
        let mut task = self.load_task(task_id).await?;
        self.check_permission(assigned_by, &task, Operation::AssignActor)
            .await?;

        let existing = self
            .store
            .assignments_for_task(task_id)
            .await
            .map_err(Self::store_failure)?;
        if existing
            .iter()
            .any(|a| a.assignee == assignee && a.blocks_reassignment())
        {
            let mut err = AppError::new(
                ErrorCategory::InvalidState,
                "actor already holds an assignment on this task",
            )
            .with_code("WF-ASSIGN-002");
            err.add_context("assignee", &assignee.to_string());
            return Err(err);
        }

        let assignment = Assignment::new(task_id, assignee, assigned_by, Utc::now());
        self.store
            .insert_assignment(assignment.clone())
            .await
            .map_err(Self::store_failure)?;

        if task.assigned_users.insert(assignee) {
            task.updated_at = Utc::now();
            self.store
                .update_task(&task)
                .await
                .map_err(Self::store_failure)?;
        }

        self.record_audit(AuditRecord::new(
            "assignment.created",
            EntityKind::Assignment,
            assignment.id,
            assigned_by,
            Value::Null,
            Self::snapshot(&assignment),
        ))
        .await;

        self.notify(Notification::new(
            assignee,
            NotificationKind::TaskAssigned,
            format!("You were assigned to \"{}\"", task.title),
            format!(
                "You were assigned to \"{}\". Accept or reject the assignment.",
                task.title
            ),
            task.id,
            NotificationMeta::Assigned { assigned_by },
        ))
        .await;

        tracing::info!(
            "actor {} assigned to task {} by {}",
            assignee,
            task.id,
            assigned_by
        );
        Ok(assignment)
    }

    /// Accept a pending assignment. A pending task moves to in-progress as
    /// part of the same operation, and the outstanding assignment
    /// notification is resolved in place rather than duplicated.
    pub async fn accept(
        &self,
        assignment_id: AssignmentId,
        actor: ActorId,
    ) -> Result<Assignment, AppError> {
        let mut assignment = self.load_assignment(assignment_id).await?;
        let mut task = self.load_task(assignment.task_id).await?;

        if assignment.assignee != actor {
            return Err(AppError::new(
                ErrorCategory::PermissionDenied,
                "only the assigned actor may accept",
            )
            .with_code("WF-ASSIGN-003"));
        }
        self.check_permission(actor, &task, Operation::AcceptAssignment)
            .await?;

        if assignment.status != AssignmentStatus::Pending {
            let mut err = AppError::new(
                ErrorCategory::InvalidState,
                "only a pending assignment can be accepted",
            )
            .with_code("WF-ASSIGN-004");
            err.add_context("status", assignment.status.as_str());
            return Err(err);
        }

        let before = Self::snapshot(&assignment);
        assignment.accept(Utc::now());
        self.store
            .update_assignment(&assignment)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "assignment.accepted",
            EntityKind::Assignment,
            assignment.id,
            actor,
            before,
            Self::snapshot(&assignment),
        ))
        .await;

        if task.status == TaskStatus::Pending {
            let task_before = Self::snapshot(&task);
            task.record_status(TaskStatus::InProgress, actor, Utc::now());
            self.store
                .update_task(&task)
                .await
                .map_err(Self::store_failure)?;
            self.record_audit(AuditRecord::new(
                "task.status_changed",
                EntityKind::Task,
                task.id,
                actor,
                task_before,
                Self::snapshot(&task),
            ))
            .await;
        }

        self.mark_notification_actioned(
            actor,
            task.id,
            NotificationKind::TaskAssigned,
            ActionTaken::Accepted,
        )
        .await;

        for lead in self.team_leads_or_empty(task.id).await {
            if lead == actor {
                continue;
            }
            self.notify(Notification::new(
                lead,
                NotificationKind::AssignmentAccepted,
                format!("Assignment accepted on \"{}\"", task.title),
                format!("An assignee accepted their assignment on \"{}\"", task.title),
                task.id,
                NotificationMeta::AssignmentAccepted { assignee: actor },
            ))
            .await;
        }

        tracing::info!("assignment {} accepted by {}", assignment.id, actor);
        Ok(assignment)
    }

    /// Reject a pending assignment with a substantive reason.
    ///
    /// The actor stays in the task's membership mirror: removal is an
    /// explicit separate operation, and the assigner may still overturn the
    /// rejection. Notification order is assigner, then creator, then team
    /// leads; the assigner hears first because they arbitrate.
    pub async fn reject(
        &self,
        assignment_id: AssignmentId,
        actor: ActorId,
        reason: &str,
    ) -> Result<Assignment, AppError> {
        self.validate_reason(reason, "WF-ASSIGN-005")?;

        let mut assignment = self.load_assignment(assignment_id).await?;
        let task = self.load_task(assignment.task_id).await?;

        if assignment.assignee != actor {
            return Err(AppError::new(
                ErrorCategory::PermissionDenied,
                "only the assigned actor may reject",
            )
            .with_code("WF-ASSIGN-003"));
        }
        self.check_permission(actor, &task, Operation::RejectAssignment)
            .await?;

        if assignment.status != AssignmentStatus::Pending {
            let mut err = AppError::new(
                ErrorCategory::InvalidState,
                "only a pending assignment can be rejected",
            )
            .with_code("WF-ASSIGN-004");
            err.add_context("status", assignment.status.as_str());
            return Err(err);
        }

        let before = Self::snapshot(&assignment);
        assignment.reject(reason.to_string(), Utc::now());
        self.store
            .update_assignment(&assignment)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "assignment.rejected",
            EntityKind::Assignment,
            assignment.id,
            actor,
            before,
            Self::snapshot(&assignment),
        ))
        .await;

        let meta = NotificationMeta::AssignmentRejected {
            assignee: actor,
            reason: reason.to_string(),
        };
        let title = format!("Assignment rejected on \"{}\"", task.title);
        let body = format!(
            "The assignment on \"{}\" was rejected: {}",
            task.title, reason
        );

        let mut notified = vec![actor];
        if assignment.assigned_by != actor {
            self.notify(Notification::new(
                assignment.assigned_by,
                NotificationKind::AssignmentRejected,
                title.clone(),
                body.clone(),
                task.id,
                meta.clone(),
            ))
            .await;
            notified.push(assignment.assigned_by);
        }
        if !notified.contains(&task.created_by) {
            self.notify(Notification::new(
                task.created_by,
                NotificationKind::AssignmentRejected,
                title.clone(),
                body.clone(),
                task.id,
                meta.clone(),
            ))
            .await;
            notified.push(task.created_by);
        }
        for lead in self.team_leads_or_empty(task.id).await {
            if notified.contains(&lead) {
                continue;
            }
            self.notify(Notification::new(
                lead,
                NotificationKind::AssignmentRejected,
                title.clone(),
                body.clone(),
                task.id,
                meta.clone(),
            ))
            .await;
            notified.push(lead);
        }

        tracing::info!("assignment {} rejected by {}", assignment.id, actor);
        Ok(assignment)
    }

    /// The assigner lets a rejection stand. The assignment becomes terminal
    /// and the assignee is released from the task.
    pub async fn approve_rejection(
        &self,
        assignment_id: AssignmentId,
        actor: ActorId,
    ) -> Result<Assignment, AppError> {
        let mut assignment = self.load_assignment(assignment_id).await?;
        let mut task = self.load_task(assignment.task_id).await?;

        self.check_arbitration_allowed(&assignment, actor, &task)
            .await?;

        let before = Self::snapshot(&assignment);
        assignment.uphold_rejection(actor, Utc::now());
        self.store
            .update_assignment(&assignment)
            .await
            .map_err(Self::store_failure)?;

        if task.assigned_users.shift_remove(&assignment.assignee) {
            task.updated_at = Utc::now();
            self.store
                .update_task(&task)
                .await
                .map_err(Self::store_failure)?;
        }

        self.record_audit(AuditRecord::new(
            "assignment.rejection_upheld",
            EntityKind::Assignment,
            assignment.id,
            actor,
            before,
            Self::snapshot(&assignment),
        ))
        .await;

        self.notify(Notification::new(
            assignment.assignee,
            NotificationKind::RejectionUpheld,
            format!("Rejection accepted on \"{}\"", task.title),
            format!(
                "Your rejection stands. You are released from \"{}\".",
                task.title
            ),
            task.id,
            NotificationMeta::RejectionUpheld { arbitrated_by: actor },
        ))
        .await;

        tracing::info!(
            "rejection of assignment {} upheld by {}",
            assignment.id,
            actor
        );
        Ok(assignment)
    }

    /// The assigner overturns a rejection: the assignment reopens as
    /// pending with the arbitration note attached.
    pub async fn dispute_rejection(
        &self,
        assignment_id: AssignmentId,
        actor: ActorId,
        reason: &str,
    ) -> Result<Assignment, AppError> {
        self.validate_reason(reason, "WF-ASSIGN-005")?;

        let mut assignment = self.load_assignment(assignment_id).await?;
        let task = self.load_task(assignment.task_id).await?;

        self.check_arbitration_allowed(&assignment, actor, &task)
            .await?;

        let before = Self::snapshot(&assignment);
        assignment.overturn_rejection(actor, reason.to_string(), Utc::now());
        self.store
            .update_assignment(&assignment)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "assignment.rejection_overturned",
            EntityKind::Assignment,
            assignment.id,
            actor,
            before,
            Self::snapshot(&assignment),
        ))
        .await;

        self.notify(Notification::new(
            assignment.assignee,
            NotificationKind::RejectionOverturned,
            format!("You are back on \"{}\"", task.title),
            format!(
                "Your rejection of \"{}\" was overturned: {}",
                task.title, reason
            ),
            task.id,
            NotificationMeta::RejectionOverturned {
                arbitrated_by: actor,
                note: reason.to_string(),
            },
        ))
        .await;

        tracing::info!(
            "rejection of assignment {} overturned by {}",
            assignment.id,
            actor
        );
        Ok(assignment)
    }

    /// Shared gate for the two arbitration calls: assigner only, rejected
    /// only, and exactly one arbitration outcome per rejection event.
    async fn check_arbitration_allowed(
        &self,
        assignment: &Assignment,
        actor: ActorId,
        task: &Task,
    ) -> Result<(), AppError> {
        if assignment.assigned_by != actor {
            return Err(AppError::new(
                ErrorCategory::PermissionDenied,
                "only the assigner may arbitrate a rejection",
            )
            .with_code("WF-ASSIGN-006"));
        }
        self.check_permission(actor, task, Operation::ArbitrateRejection)
            .await?;

        if assignment.status != AssignmentStatus::Rejected {
            let mut err = AppError::new(
                ErrorCategory::InvalidState,
                "assignment is not rejected",
            )
            .with_code("WF-ASSIGN-007");
            err.add_context("status", assignment.status.as_str());
            return Err(err);
        }
        if assignment.rejection_arbitrated() {
            return Err(AppError::new(
                ErrorCategory::InvalidState,
                "this rejection has already been arbitrated",
            )
            .with_code("WF-ASSIGN-007"));
        }
        Ok(())
    }
}
