use crate::core::types::{ApprovalStatus, AssignmentStatus, TaskStatus};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque assignment identifier, scoped under its task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssignmentId(pub Uuid);

impl AssignmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reference to a human actor (user account id in the host system).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One accepted status change. Appended exactly once per actual change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TaskStatus,
    pub changed_by: ActorId,
    pub changed_at: DateTime<Utc>,
}

/// Input payload for task creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: ActorId,
}

/// A unit of work. Mutated only by the workflow engine.
///
/// `assigned_users` is a denormalized mirror kept for fast membership
/// checks; the assignment collection is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub status: TaskStatus,
    pub status_history: Vec<StatusChange>,
    pub status_updated_by: Option<ActorId>,
    pub status_updated_at: Option<DateTime<Utc>>,

    pub approval_status: ApprovalStatus,
    pub approval_requested_by: Option<ActorId>,
    pub approval_requested_at: Option<DateTime<Utc>>,
    pub approved_by: Option<ActorId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_rejected_by: Option<ActorId>,
    pub approval_rejected_at: Option<DateTime<Utc>>,
    pub approval_rejection_reason: Option<String>,

    pub is_in_pool: bool,
    pub pool_requests: IndexSet<ActorId>,
    pub assigned_users: IndexSet<ActorId>,
}

impl Task {
    pub fn new(input: NewTask, now: DateTime<Utc>) -> Self {
        let creator = input.created_by;
        Self {
            id: TaskId::new(),
            title: input.title,
            description: input.description,
            created_by: creator,
            created_at: now,
            updated_at: now,
            status: TaskStatus::Pending,
            status_history: vec![StatusChange {
                status: TaskStatus::Pending,
                changed_by: creator,
                changed_at: now,
            }],
            status_updated_by: Some(creator),
            status_updated_at: Some(now),
            approval_status: ApprovalStatus::None,
            approval_requested_by: None,
            approval_requested_at: None,
            approved_by: None,
            approved_at: None,
            approval_rejected_by: None,
            approval_rejected_at: None,
            approval_rejection_reason: None,
            is_in_pool: false,
            pool_requests: IndexSet::new(),
            assigned_users: IndexSet::new(),
        }
    }

    /// Apply a status change: one history entry, stamps updated.
    ///
    /// Callers must have already checked that `status != self.status`;
    /// a same-status call is a no-op at the operation layer and never
    /// reaches this method.
    pub fn record_status(&mut self, status: TaskStatus, actor: ActorId, now: DateTime<Utc>) {
        self.status = status;
        self.status_history.push(StatusChange {
            status,
            changed_by: actor,
            changed_at: now,
        });
        self.status_updated_by = Some(actor);
        self.status_updated_at = Some(now);
        self.updated_at = now;
    }

    /// Enter (or re-enter) the approval gate. Clears any previous decision
    /// so the stamps always describe the current gate event.
    pub fn enter_approval_gate(&mut self, actor: ActorId, now: DateTime<Utc>) {
        self.approval_status = ApprovalStatus::Pending;
        self.approval_requested_by = Some(actor);
        self.approval_requested_at = Some(now);
        self.approved_by = None;
        self.approved_at = None;
        self.approval_rejected_by = None;
        self.approval_rejected_at = None;
        self.approval_rejection_reason = None;
        self.updated_at = now;
    }

    /// Grant approval. Couples `approval_status` and `status` in one
    /// document write; returns true when the status actually changed.
    pub fn grant_approval(&mut self, approver: ActorId, now: DateTime<Utc>) -> bool {
        self.approval_status = ApprovalStatus::Approved;
        self.approved_by = Some(approver);
        self.approved_at = Some(now);
        self.updated_at = now;
        if self.status != TaskStatus::Completed {
            self.record_status(TaskStatus::Completed, approver, now);
            true
        } else {
            false
        }
    }

    /// Reject approval: back to in-progress, same coupling rule.
    pub fn deny_approval(
        &mut self,
        approver: ActorId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        self.approval_status = ApprovalStatus::Rejected;
        self.approval_rejected_by = Some(approver);
        self.approval_rejected_at = Some(now);
        self.approval_rejection_reason = reason;
        self.updated_at = now;
        if self.status != TaskStatus::InProgress {
            self.record_status(TaskStatus::InProgress, approver, now);
            true
        } else {
            false
        }
    }
}

/// The relationship between one task and one actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub task_id: TaskId,
    pub assignee: ActorId,
    pub assigned_by: ActorId,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub status: AssignmentStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub rejection_reason: Option<String>,
    pub rejection_approved_by: Option<ActorId>,
    pub rejection_approved_at: Option<DateTime<Utc>>,
    pub rejection_rejected_by: Option<ActorId>,
    pub rejection_rejected_at: Option<DateTime<Utc>>,
    pub rejection_rejection_reason: Option<String>,
}

impl Assignment {
    pub fn new(
        task_id: TaskId,
        assignee: ActorId,
        assigned_by: ActorId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            task_id,
            assignee,
            assigned_by,
            assigned_at: now,
            updated_at: now,
            status: AssignmentStatus::Pending,
            accepted_at: None,
            completed_at: None,
            rejection_reason: None,
            rejection_approved_by: None,
            rejection_approved_at: None,
            rejection_rejected_by: None,
            rejection_rejected_at: None,
            rejection_rejection_reason: None,
        }
    }

    pub fn accept(&mut self, now: DateTime<Utc>) {
        self.status = AssignmentStatus::Accepted;
        self.accepted_at = Some(now);
        self.updated_at = now;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = AssignmentStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn reject(&mut self, reason: String, now: DateTime<Utc>) {
        self.status = AssignmentStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.updated_at = now;
    }

    /// The assigner lets the rejection stand. Terminal.
    pub fn uphold_rejection(&mut self, arbiter: ActorId, now: DateTime<Utc>) {
        self.rejection_approved_by = Some(arbiter);
        self.rejection_approved_at = Some(now);
        self.updated_at = now;
    }

    /// The assigner overturns the rejection: back to pending, the original
    /// rejection reason is cleared and the arbitration note recorded.
    pub fn overturn_rejection(&mut self, arbiter: ActorId, note: String, now: DateTime<Utc>) {
        self.status = AssignmentStatus::Pending;
        self.rejection_rejected_by = Some(arbiter);
        self.rejection_rejected_at = Some(now);
        self.rejection_rejection_reason = Some(note);
        self.rejection_reason = None;
        self.updated_at = now;
    }

    /// Pending or accepted: the actor is actively on the task.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            AssignmentStatus::Pending | AssignmentStatus::Accepted
        )
    }

    /// Either arbitration outcome has been recorded for the current
    /// rejection event.
    pub fn rejection_arbitrated(&self) -> bool {
        self.rejection_approved_by.is_some() || self.rejection_rejected_by.is_some()
    }

    /// A new assignment for the same actor is refused while this one is
    /// active or its rejection still awaits arbitration.
    pub fn blocks_reassignment(&self) -> bool {
        self.is_active()
            || (self.status == AssignmentStatus::Rejected
                && self.rejection_approved_by.is_none())
    }
}
