//! Pool coordinator: claim protocol for tasks without a committed assignee.
//!
//! Interested actors file claim requests instead of racing to assign
//! themselves; the task creator approves or rejects each claim. Approving a
//! claim creates an already-accepted assignment, since claiming implies
//! consent to do the work.

use super::WorkflowEngine;
use crate::core::audit::{AuditRecord, EntityKind};
use crate::core::entities::{ActorId, Assignment, Task, TaskId};
use crate::core::error::AppError;
use crate::core::notify::{Notification, NotificationKind, NotificationMeta};
use crate::core::store::WorkflowStore;
use crate::core::types::{AssignmentStatus, ErrorCategory, Operation, TaskStatus};
use chrono::Utc;
use serde_json::Value;

impl WorkflowEngine {
    /// Open a task to claim requests. Requires a task with no committed
    /// (accepted) assignee; an already pooled task is refused rather than
    /// silently clearing the claims filed so far.
    pub async fn add_to_pool(&self, task_id: TaskId, actor: ActorId) -> Result<Task, AppError> {
        let mut task = self.load_task(task_id).await?;
        self.check_permission(actor, &task, Operation::AddToPool)
            .await?;

        if task.is_in_pool {
            return Err(AppError::new(
                ErrorCategory::InvalidState,
                "task is already in the pool",
            )
            .with_code("WF-POOL-001"));
        }

        let assignments = self
            .store
            .assignments_for_task(task_id)
            .await
            .map_err(Self::store_failure)?;
        if assignments
            .iter()
            .any(|a| a.status == AssignmentStatus::Accepted)
        {
            return Err(AppError::new(
                ErrorCategory::InvalidState,
                "task already has a committed assignee",
            )
            .with_code("WF-POOL-002"));
        }

        let before = Self::snapshot(&task);
        task.is_in_pool = true;
        task.pool_requests.clear();
        task.updated_at = Utc::now();
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "pool.added",
            EntityKind::Task,
            task.id,
            actor,
            before,
            Self::snapshot(&task),
        ))
        .await;

        for recipient in self.all_actors_or_empty().await {
            if recipient == task.created_by || recipient == actor {
                continue;
            }
            self.notify(Notification::new(
                recipient,
                NotificationKind::PooledTaskAvailable,
                format!("\"{}\" is open for claims", task.title),
                format!("\"{}\" was added to the pool and can be claimed", task.title),
                task.id,
                NotificationMeta::PoolBroadcast { added_by: actor },
            ))
            .await;
        }

        tracing::info!("task {} added to pool by {}", task.id, actor);
        Ok(task)
    }

    /// File a claim on a pooled task. One claim per actor; filing twice is a
    /// state conflict, so the request set never holds duplicates.
    pub async fn request_claim(&self, task_id: TaskId, actor: ActorId) -> Result<Task, AppError> {
        let mut task = self.load_task(task_id).await?;
        self.check_permission(actor, &task, Operation::RequestClaim)
            .await?;

        if !task.is_in_pool {
            return Err(AppError::new(
                ErrorCategory::InvalidState,
                "task is not in the pool",
            )
            .with_code("WF-POOL-003"));
        }
        if task.pool_requests.contains(&actor) {
            return Err(AppError::new(
                ErrorCategory::InvalidState,
                "actor has already requested this task",
            )
            .with_code("WF-POOL-004"));
        }

        let before = Self::snapshot(&task);
        task.pool_requests.insert(actor);
        task.updated_at = Utc::now();
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "pool.claim_requested",
            EntityKind::Task,
            task.id,
            actor,
            before,
            Self::snapshot(&task),
        ))
        .await;

        if task.created_by != actor {
            self.notify(Notification::new(
                task.created_by,
                NotificationKind::PoolClaimRequested,
                format!("Claim request on \"{}\"", task.title),
                format!("An actor asked to take \"{}\"", task.title),
                task.id,
                NotificationMeta::ClaimRequested { claimant: actor },
            ))
            .await;
        }

        tracing::info!("claim on task {} requested by {}", task.id, actor);
        Ok(task)
    }

    /// Grant a claim: the claimant gets an assignment that is already
    /// accepted. With `keep_in_pool = false` the pool closes and every other
    /// claimant is dropped with an explicit notification.
    pub async fn approve_claim(
        &self,
        task_id: TaskId,
        claimant: ActorId,
        approver: ActorId,
        keep_in_pool: bool,
    ) -> Result<Assignment, AppError> {
        let mut task = self.load_task(task_id).await?;
        Self::require_creator(&task, approver)?;
        self.check_permission(approver, &task, Operation::DecideClaim)
            .await?;
        Self::require_claim(&task, claimant)?;

        let existing = self
            .store
            .assignments_for_task(task_id)
            .await
            .map_err(Self::store_failure)?;
        if existing
            .iter()
            .any(|a| a.assignee == claimant && a.blocks_reassignment())
        {
            return Err(AppError::new(
                ErrorCategory::InvalidState,
                "claimant already holds an assignment on this task",
            )
            .with_code("WF-ASSIGN-002"));
        }

        let mut assignment = Assignment::new(task_id, claimant, approver, Utc::now());
        assignment.accept(Utc::now());
        self.store
            .insert_assignment(assignment.clone())
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "assignment.created",
            EntityKind::Assignment,
            assignment.id,
            approver,
            Value::Null,
            Self::snapshot(&assignment),
        ))
        .await;

        let before = Self::snapshot(&task);
        task.assigned_users.insert(claimant);
        task.pool_requests.shift_remove(&claimant);
        let dropped: Vec<ActorId> = if keep_in_pool {
            Vec::new()
        } else {
            let remaining = task.pool_requests.iter().copied().collect();
            task.pool_requests.clear();
            task.is_in_pool = false;
            remaining
        };
        if task.status == TaskStatus::Pending {
            task.record_status(TaskStatus::InProgress, approver, Utc::now());
        } else {
            task.updated_at = Utc::now();
        }
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "pool.claim_approved",
            EntityKind::Task,
            task.id,
            approver,
            before,
            Self::snapshot(&task),
        ))
        .await;

        self.notify(Notification::new(
            claimant,
            NotificationKind::PoolClaimApproved,
            format!("Your claim on \"{}\" was approved", task.title),
            format!("You are now assigned to \"{}\"", task.title),
            task.id,
            NotificationMeta::ClaimDecided {
                claimant,
                approved: true,
                decided_by: approver,
            },
        ))
        .await;

        if self.settings().notify_dropped_claims {
            for other in dropped {
                self.notify(Notification::new(
                    other,
                    NotificationKind::PoolClaimDropped,
                    format!("\"{}\" left the pool", task.title),
                    format!(
                        "\"{}\" was claimed by someone else and is no longer available",
                        task.title
                    ),
                    task.id,
                    NotificationMeta::ClaimDropped {
                        decided_by: approver,
                    },
                ))
                .await;
            }
        }

        tracing::info!(
            "claim on task {} by {} approved by {} (keep_in_pool={})",
            task.id,
            claimant,
            approver,
            keep_in_pool
        );
        Ok(assignment)
    }

    /// Turn down a claim. The request disappears; nothing else changes.
    pub async fn reject_claim(
        &self,
        task_id: TaskId,
        claimant: ActorId,
        actor: ActorId,
    ) -> Result<Task, AppError> {
        let mut task = self.load_task(task_id).await?;
        Self::require_creator(&task, actor)?;
        self.check_permission(actor, &task, Operation::DecideClaim)
            .await?;
        Self::require_claim(&task, claimant)?;

        let before = Self::snapshot(&task);
        task.pool_requests.shift_remove(&claimant);
        task.updated_at = Utc::now();
        self.store
            .update_task(&task)
            .await
            .map_err(Self::store_failure)?;

        self.record_audit(AuditRecord::new(
            "pool.claim_rejected",
            EntityKind::Task,
            task.id,
            actor,
            before,
            Self::snapshot(&task),
        ))
        .await;

        self.notify(Notification::new(
            claimant,
            NotificationKind::PoolClaimRejected,
            format!("Your claim on \"{}\" was declined", task.title),
            format!("Your request to take \"{}\" was declined", task.title),
            task.id,
            NotificationMeta::ClaimDecided {
                claimant,
                approved: false,
                decided_by: actor,
            },
        ))
        .await;

        tracing::info!(
            "claim on task {} by {} rejected by {}",
            task.id,
            claimant,
            actor
        );
        Ok(task)
    }

    fn require_creator(task: &Task, actor: ActorId) -> Result<(), AppError> {
        if task.created_by != actor {
            return Err(AppError::new(
                ErrorCategory::PermissionDenied,
                "only the task creator decides pool claims",
            )
            .with_code("WF-POOL-006"));
        }
        Ok(())
    }

    fn require_claim(task: &Task, claimant: ActorId) -> Result<(), AppError> {
        if !task.pool_requests.contains(&claimant) {
            let mut err = AppError::new(
                ErrorCategory::InvalidState,
                "no pending claim from this actor",
            )
            .with_code("WF-POOL-005");
            err.add_context("claimant", &claimant.to_string());
            return Err(err);
        }
        Ok(())
    }
}
