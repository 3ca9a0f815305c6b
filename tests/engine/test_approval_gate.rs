mod common;

use common::{harness, harness_with_oracle, new_task_input, DenyOperation, Harness};
use foreman::core::entities::{ActorId, Task};
use foreman::core::notify::NotificationKind;
use foreman::core::store::WorkflowStore;
use foreman::core::types::{ApprovalStatus, AssignmentStatus, ErrorCategory, Operation, TaskStatus};
use std::sync::Arc;

/// assign -> accept, leaving the task in progress with an accepted assignee.
async fn worked_task(h: &Harness) -> (Task, ActorId, ActorId) {
    let creator = ActorId::new();
    let assignee = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Prepare the quarterly review"))
        .await
        .unwrap();
    let assignment = h.engine.assign(task.id, assignee, creator).await.unwrap();
    h.engine.accept(assignment.id, assignee).await.unwrap();
    let task = h.store.get_task(task.id).await.unwrap().unwrap();
    (task, creator, assignee)
}

#[tokio::test]
async fn full_path_from_assignment_to_approval() {
    let h = harness();
    let (task, creator, assignee) = worked_task(&h).await;

    h.engine.request_approval(task.id, assignee).await.unwrap();
    let approved = h.engine.approve(task.id, creator).await.unwrap();

    assert_eq!(approved.status, TaskStatus::Completed);
    assert_eq!(approved.approval_status, ApprovalStatus::Approved);
    assert_eq!(approved.approved_by, Some(creator));

    // Creation seeds one entry; acceptance and approval add one each.
    assert_eq!(approved.status_history.len(), 3);

    // The requester-assignee gets exactly one approval notification.
    assert_eq!(
        h.notifications
            .count_for(assignee, NotificationKind::TaskApproved),
        1
    );

    // The accepted assignment finished with the task.
    let assignments = h.store.assignments_for_task(task.id).await.unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].status, AssignmentStatus::Completed);
    assert!(assignments[0].completed_at.is_some());
}

#[tokio::test]
async fn requesting_twice_is_a_no_op_without_duplicate_notification() {
    let h = harness();
    let (task, creator, assignee) = worked_task(&h).await;

    h.engine.request_approval(task.id, assignee).await.unwrap();
    let again = h.engine.request_approval(task.id, assignee).await.unwrap();

    assert_eq!(again.approval_status, ApprovalStatus::Pending);
    assert_eq!(
        h.notifications
            .count_for(creator, NotificationKind::ApprovalRequested),
        1
    );
}

#[tokio::test]
async fn requesting_on_an_unworked_task_is_refused() {
    let h = harness();
    let creator = ActorId::new();
    let assignee = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Sketch the new dashboard"))
        .await
        .unwrap();
    h.engine.assign(task.id, assignee, creator).await.unwrap();

    // Still pending: nobody accepted, nobody worked.
    let err = h
        .engine
        .request_approval(task.id, assignee)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::InvalidState);
}

#[tokio::test]
async fn an_accepted_assignee_requests_even_when_the_oracle_denies() {
    let h = harness_with_oracle(Arc::new(DenyOperation(Operation::RequestApproval)));
    let (task, _creator, assignee) = worked_task(&h).await;

    let requested = h.engine.request_approval(task.id, assignee).await.unwrap();

    assert_eq!(requested.approval_status, ApprovalStatus::Pending);
    assert_eq!(requested.approval_requested_by, Some(assignee));
}

#[tokio::test]
async fn a_non_assignee_is_denied_without_an_oracle_grant() {
    let h = harness_with_oracle(Arc::new(DenyOperation(Operation::RequestApproval)));
    let (task, creator, _assignee) = worked_task(&h).await;

    let err = h
        .engine
        .request_approval(task.id, creator)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::PermissionDenied);

    let reloaded = h.store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(reloaded.approval_status, ApprovalStatus::None);
}

#[tokio::test]
async fn an_oracle_grant_lets_a_non_assignee_request() {
    let h = harness();
    let (task, creator, _assignee) = worked_task(&h).await;

    let requested = h.engine.request_approval(task.id, creator).await.unwrap();

    assert_eq!(requested.approval_status, ApprovalStatus::Pending);
    assert_eq!(requested.approval_requested_by, Some(creator));
}

#[tokio::test]
async fn requesting_an_approved_task_is_refused() {
    let h = harness();
    let (task, creator, assignee) = worked_task(&h).await;
    h.engine.request_approval(task.id, assignee).await.unwrap();
    h.engine.approve(task.id, creator).await.unwrap();

    let err = h
        .engine
        .request_approval(task.id, assignee)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::InvalidState);
}

#[tokio::test]
async fn deciding_without_a_pending_request_is_refused() {
    let h = harness();
    let (task, creator, _assignee) = worked_task(&h).await;

    let err = h.engine.approve(task.id, creator).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::InvalidState);

    let err = h
        .engine
        .reject_approval(task.id, creator, None)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::InvalidState);
}

#[tokio::test]
async fn gate_rejection_returns_the_task_to_in_progress() {
    let h = harness();
    let (task, creator, assignee) = worked_task(&h).await;
    h.engine.request_approval(task.id, assignee).await.unwrap();
    let history_before = h
        .store
        .get_task(task.id)
        .await
        .unwrap()
        .unwrap()
        .status_history
        .len();

    let rejected = h
        .engine
        .reject_approval(task.id, creator, Some("missing the rollback notes".to_string()))
        .await
        .unwrap();

    assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
    assert_eq!(rejected.status, TaskStatus::InProgress);
    assert_eq!(
        rejected.approval_rejection_reason.as_deref(),
        Some("missing the rollback notes")
    );
    // The status was already in progress, so no extra history entry.
    assert_eq!(rejected.status_history.len(), history_before);
    assert_eq!(
        h.notifications
            .count_for(assignee, NotificationKind::ApprovalRejected),
        1
    );
}

#[tokio::test]
async fn a_rejected_gate_can_be_re_entered() {
    let h = harness();
    let (task, creator, assignee) = worked_task(&h).await;
    h.engine.request_approval(task.id, assignee).await.unwrap();
    h.engine
        .reject_approval(task.id, creator, Some("tests are red on the release branch".to_string()))
        .await
        .unwrap();

    let requested = h.engine.request_approval(task.id, assignee).await.unwrap();

    assert_eq!(requested.approval_status, ApprovalStatus::Pending);
    assert!(requested.approval_rejected_by.is_none());
    assert!(requested.approval_rejection_reason.is_none());
}

#[tokio::test]
async fn approved_task_status_is_pinned() {
    let h = harness();
    let (task, creator, assignee) = worked_task(&h).await;
    h.engine.request_approval(task.id, assignee).await.unwrap();
    h.engine.approve(task.id, creator).await.unwrap();

    let err = h
        .engine
        .update_status(task.id, TaskStatus::InProgress, creator)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::InvalidState);

    let reloaded = h.store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, TaskStatus::Completed);
    assert_eq!(reloaded.approval_status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn direct_completion_is_blocked_while_the_gate_is_pending() {
    let h = harness();
    let (task, _creator, assignee) = worked_task(&h).await;
    h.engine.request_approval(task.id, assignee).await.unwrap();

    let err = h
        .engine
        .update_status(task.id, TaskStatus::Completed, assignee)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::InvalidState);
}
