//! Document-store contract for the workflow engine.
//!
//! The engine owns task and assignment documents and applies every state
//! transition as one read-modify-write against a single document. The store
//! guarantees per-document atomic writes only; there are no cross-document
//! transactions, so cascades are issued child-first by the engine.

pub mod memory;

pub use memory::MemoryStore;

use crate::core::entities::{Assignment, AssignmentId, Task, TaskId};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("store serialization failed: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> Result<(), StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Replace the task document. Last write wins.
    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError>;

    async fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError>;

    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StoreError>;

    async fn update_assignment(&self, assignment: &Assignment) -> Result<(), StoreError>;

    async fn delete_assignment(&self, id: AssignmentId) -> Result<(), StoreError>;

    /// Equality-filter query: every assignment belonging to the task,
    /// ordered by assignment time.
    async fn assignments_for_task(&self, task_id: TaskId) -> Result<Vec<Assignment>, StoreError>;

    /// Cascade helper: remove all assignments under a task, returning how
    /// many were deleted. Called before the parent task is deleted.
    async fn delete_assignments_for_task(&self, task_id: TaskId) -> Result<usize, StoreError>;
}
