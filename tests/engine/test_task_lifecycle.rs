mod common;

use common::{harness, harness_with_oracle, new_task_input, DenyAll};
use foreman::core::entities::{ActorId, TaskId};
use foreman::core::notify::NotificationKind;
use foreman::core::store::WorkflowStore;
use foreman::core::types::{ApprovalStatus, ErrorCategory, TaskStatus};
use std::sync::Arc;

#[tokio::test]
async fn create_task_starts_pending_with_seeded_history() {
    let h = harness();
    let creator = ActorId::new();

    let task = h
        .engine
        .create_task(new_task_input(creator, "Draft the release notes"))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.approval_status, ApprovalStatus::None);
    assert_eq!(task.status_history.len(), 1);
    assert!(h.audit.actions().contains(&"task.created".to_string()));
}

#[tokio::test]
async fn create_task_rejects_blank_title() {
    let h = harness();
    let err = h
        .engine
        .create_task(new_task_input(ActorId::new(), "   "))
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::ValidationError);
}

#[tokio::test]
async fn same_status_update_is_a_silent_success() {
    let h = harness();
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Refill the coffee machine"))
        .await
        .unwrap();
    let audits_before = h.audit.records().len();

    let updated = h
        .engine
        .update_status(task.id, TaskStatus::Pending, creator)
        .await
        .unwrap();

    assert_eq!(updated.status_history.len(), 1);
    assert_eq!(h.audit.records().len(), audits_before);
    assert!(h.notifications.entries().is_empty());
}

#[tokio::test]
async fn status_change_appends_history_and_notifies_watchers() {
    let h = harness();
    let creator = ActorId::new();
    let assignee = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Migrate the billing data"))
        .await
        .unwrap();
    h.engine.assign(task.id, assignee, creator).await.unwrap();

    let updated = h
        .engine
        .update_status(task.id, TaskStatus::InProgress, creator)
        .await
        .unwrap();

    assert_eq!(updated.status, TaskStatus::InProgress);
    assert_eq!(updated.status_history.len(), 2);
    assert_eq!(updated.status_updated_by, Some(creator));
    assert!(h
        .audit
        .actions()
        .contains(&"task.status_changed".to_string()));

    // The acting creator is not notified; the pending assignee is.
    assert_eq!(
        h.notifications
            .count_for(assignee, NotificationKind::StatusChanged),
        1
    );
    assert_eq!(
        h.notifications
            .count_for(creator, NotificationKind::StatusChanged),
        0
    );
}

#[tokio::test]
async fn assigned_task_cannot_complete_without_the_gate() {
    let h = harness();
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Ship the beta build"))
        .await
        .unwrap();
    h.engine
        .assign(task.id, ActorId::new(), creator)
        .await
        .unwrap();

    let err = h
        .engine
        .update_status(task.id, TaskStatus::Completed, creator)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::InvalidState);
}

#[tokio::test]
async fn unassigned_task_may_complete_directly() {
    let h = harness();
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Rotate the API keys"))
        .await
        .unwrap();

    h.engine
        .update_status(task.id, TaskStatus::InProgress, creator)
        .await
        .unwrap();
    let done = h
        .engine
        .update_status(task.id, TaskStatus::Completed, creator)
        .await
        .unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.approval_status, ApprovalStatus::None);
    assert_eq!(done.status_history.len(), 3);
}

#[tokio::test]
async fn missing_task_is_not_found() {
    let h = harness();
    let err = h
        .engine
        .update_status(TaskId::new(), TaskStatus::InProgress, ActorId::new())
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::NotFound);
}

#[tokio::test]
async fn denied_update_leaves_the_task_untouched() {
    let denied = harness_with_oracle(Arc::new(DenyAll));
    let creator = ActorId::new();
    let task = denied
        .engine
        .create_task(new_task_input(creator, "Tidy the wiki"))
        .await
        .unwrap();

    let err = denied
        .engine
        .update_status(task.id, TaskStatus::InProgress, creator)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::PermissionDenied);

    let reloaded = denied
        .store
        .get_task(task.id)
        .await
        .unwrap()
        .expect("task still exists");
    assert_eq!(reloaded.status, TaskStatus::Pending);
    assert_eq!(reloaded.status_history.len(), 1);
}

#[tokio::test]
async fn remove_assignee_deletes_assignments_and_membership() {
    let h = harness();
    let creator = ActorId::new();
    let assignee = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Audit the access logs"))
        .await
        .unwrap();
    h.engine.assign(task.id, assignee, creator).await.unwrap();

    h.engine
        .remove_assignee(task.id, assignee, creator)
        .await
        .unwrap();

    assert_eq!(h.store.assignment_count(), 0);
    let reloaded = h
        .store
        .get_task(task.id)
        .await
        .unwrap()
        .expect("task still exists");
    assert!(reloaded.assigned_users.is_empty());
    assert_eq!(
        h.notifications
            .count_for(assignee, NotificationKind::RemovedFromTask),
        1
    );
}

#[tokio::test]
async fn removing_an_absent_assignee_is_idempotent() {
    let h = harness();
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Renew the TLS certificates"))
        .await
        .unwrap();

    h.engine
        .remove_assignee(task.id, ActorId::new(), creator)
        .await
        .unwrap();
    assert!(h.notifications.entries().is_empty());
}

#[tokio::test]
async fn delete_task_cascades_assignments_first() {
    let h = harness();
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Retire the legacy queue"))
        .await
        .unwrap();
    h.engine
        .assign(task.id, ActorId::new(), creator)
        .await
        .unwrap();
    h.engine
        .assign(task.id, ActorId::new(), creator)
        .await
        .unwrap();

    h.engine.delete_task(task.id, creator).await.unwrap();

    assert_eq!(h.store.task_count(), 0);
    assert_eq!(h.store.assignment_count(), 0);
    assert!(h.audit.actions().contains(&"task.deleted".to_string()));
}
