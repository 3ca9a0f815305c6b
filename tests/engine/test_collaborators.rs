mod common;

use common::{
    harness, harness_with_oracle, new_task_input, BrokenDirectory, BrokenOracle, DenyOperation,
    FailingAuditSink, FailingNotificationSink,
};
use foreman::core::audit::MemoryAuditSink;
use foreman::core::directory::EmptyDirectory;
use foreman::core::entities::ActorId;
use foreman::core::notify::MemoryNotificationSink;
use foreman::core::permissions::AllowAll;
use foreman::core::store::{MemoryStore, WorkflowStore};
use foreman::core::types::{AssignmentStatus, ErrorCategory, Operation, TaskStatus};
use foreman::core::WorkflowEngine;
use std::sync::Arc;

#[tokio::test]
async fn a_dead_audit_sink_does_not_block_acceptance() {
    let store = Arc::new(MemoryStore::new());
    let notifications = Arc::new(MemoryNotificationSink::new());
    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(AllowAll),
        Arc::new(EmptyDirectory),
        notifications.clone(),
        Arc::new(FailingAuditSink),
    );

    let creator = ActorId::new();
    let assignee = ActorId::new();
    let task = engine
        .create_task(new_task_input(creator, "Patch the build image"))
        .await
        .unwrap();
    let assignment = engine.assign(task.id, assignee, creator).await.unwrap();

    let accepted = engine.accept(assignment.id, assignee).await.unwrap();
    assert_eq!(accepted.status, AssignmentStatus::Accepted);

    let stored = store
        .get_assignment(assignment.id)
        .await
        .unwrap()
        .expect("assignment persisted");
    assert_eq!(stored.status, AssignmentStatus::Accepted);
}

#[tokio::test]
async fn a_dead_notification_sink_does_not_block_assignment() {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(AllowAll),
        Arc::new(EmptyDirectory),
        Arc::new(FailingNotificationSink),
        audit.clone(),
    );

    let creator = ActorId::new();
    let task = engine
        .create_task(new_task_input(creator, "Trim the feature flags"))
        .await
        .unwrap();
    let assignment = engine
        .assign(task.id, ActorId::new(), creator)
        .await
        .unwrap();

    assert!(store
        .get_assignment(assignment.id)
        .await
        .unwrap()
        .is_some());
    assert!(audit
        .actions()
        .contains(&"assignment.created".to_string()));
}

#[tokio::test]
async fn a_dead_directory_only_costs_the_lead_notifications() {
    let store = Arc::new(MemoryStore::new());
    let notifications = Arc::new(MemoryNotificationSink::new());
    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(AllowAll),
        Arc::new(BrokenDirectory),
        notifications.clone(),
        Arc::new(MemoryAuditSink::new()),
    );

    let creator = ActorId::new();
    let assignee = ActorId::new();
    let task = engine
        .create_task(new_task_input(creator, "Split the oversized module"))
        .await
        .unwrap();
    let assignment = engine.assign(task.id, assignee, creator).await.unwrap();

    let accepted = engine.accept(assignment.id, assignee).await.unwrap();
    assert_eq!(accepted.status, AssignmentStatus::Accepted);
}

#[tokio::test]
async fn denial_aborts_before_any_write() {
    let h = harness_with_oracle(Arc::new(DenyOperation(Operation::AssignActor)));
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Scope the cache rewrite"))
        .await
        .unwrap();

    let err = h
        .engine
        .assign(task.id, ActorId::new(), creator)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::PermissionDenied);

    assert_eq!(h.store.assignment_count(), 0);
    let reloaded = h.store.get_task(task.id).await.unwrap().unwrap();
    assert!(reloaded.assigned_users.is_empty());
    assert!(h.notifications.entries().is_empty());
}

#[tokio::test]
async fn an_unreachable_oracle_fails_closed() {
    let h = harness_with_oracle(Arc::new(BrokenOracle));
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Benchmark the new codec"))
        .await
        .unwrap();

    let err = h
        .engine
        .update_status(task.id, TaskStatus::InProgress, creator)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::PermissionDenied);
}

#[tokio::test]
async fn audit_records_carry_before_and_after_snapshots() {
    let h = harness();
    let creator = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Archive the old sprints"))
        .await
        .unwrap();

    h.engine
        .update_status(task.id, TaskStatus::InProgress, creator)
        .await
        .unwrap();

    let records = h.audit.records();
    let change = records
        .iter()
        .find(|r| r.action == "task.status_changed")
        .expect("status change audited");
    assert_eq!(change.before["status"], "pending");
    assert_eq!(change.after["status"], "in_progress");
    assert_eq!(change.actor, creator);
}

#[tokio::test]
async fn every_transition_of_the_happy_path_is_audited() {
    let h = harness();
    let creator = ActorId::new();
    let assignee = ActorId::new();
    let task = h
        .engine
        .create_task(new_task_input(creator, "Close out the beta feedback"))
        .await
        .unwrap();
    let assignment = h.engine.assign(task.id, assignee, creator).await.unwrap();
    h.engine.accept(assignment.id, assignee).await.unwrap();
    h.engine.request_approval(task.id, assignee).await.unwrap();
    h.engine.approve(task.id, creator).await.unwrap();

    let actions = h.audit.actions();
    for expected in [
        "task.created",
        "assignment.created",
        "assignment.accepted",
        "task.status_changed",
        "approval.requested",
        "approval.approved",
        "assignment.completed",
    ] {
        assert!(
            actions.contains(&expected.to_string()),
            "missing audit action {}",
            expected
        );
    }
}
