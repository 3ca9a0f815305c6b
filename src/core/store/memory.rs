//! In-memory store used by tests and embedders without a real backend.

use super::{StoreError, WorkflowStore};
use crate::core::entities::{Assignment, AssignmentId, Task, TaskId};
use async_trait::async_trait;
use dashmap::DashMap;

/// Keeps whole documents in concurrent maps. Each map operation replaces a
/// full document, which matches the per-document atomicity the engine
/// relies on.
#[derive(Default)]
pub struct MemoryStore {
    tasks: DashMap<TaskId, Task>,
    assignments: DashMap<AssignmentId, Assignment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get(&id).map(|entry| entry.clone()))
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        self.tasks.remove(&id);
        Ok(())
    }

    async fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError> {
        self.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StoreError> {
        Ok(self.assignments.get(&id).map(|entry| entry.clone()))
    }

    async fn update_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        self.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<(), StoreError> {
        self.assignments.remove(&id);
        Ok(())
    }

    async fn assignments_for_task(&self, task_id: TaskId) -> Result<Vec<Assignment>, StoreError> {
        let mut matching: Vec<Assignment> = self
            .assignments
            .iter()
            .filter(|entry| entry.task_id == task_id)
            .map(|entry| entry.clone())
            .collect();
        matching.sort_by_key(|a| (a.assigned_at, a.id));
        Ok(matching)
    }

    async fn delete_assignments_for_task(&self, task_id: TaskId) -> Result<usize, StoreError> {
        let ids: Vec<AssignmentId> = self
            .assignments
            .iter()
            .filter(|entry| entry.task_id == task_id)
            .map(|entry| entry.id)
            .collect();
        for id in &ids {
            self.assignments.remove(id);
        }
        Ok(ids.len())
    }
}
