//! Read-only actor lookups resolved by the host system.
//!
//! Team leads come from department/manager data the engine never sees;
//! the full actor list backs pool broadcasts. Lookup failures degrade to
//! an empty audience at the call site and never fail an operation.

use crate::core::entities::{ActorId, TaskId};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("actor directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Team leads responsible for the task's department.
    async fn team_leads(&self, task_id: TaskId) -> Result<Vec<ActorId>, DirectoryError>;

    /// Every actor eligible to see pool broadcasts.
    async fn all_actors(&self) -> Result<Vec<ActorId>, DirectoryError>;
}

/// Directory with no actors. Tests and embedders that handle broadcast
/// audiences upstream use this.
pub struct EmptyDirectory;

#[async_trait]
impl ActorDirectory for EmptyDirectory {
    async fn team_leads(&self, _task_id: TaskId) -> Result<Vec<ActorId>, DirectoryError> {
        Ok(Vec::new())
    }

    async fn all_actors(&self) -> Result<Vec<ActorId>, DirectoryError> {
        Ok(Vec::new())
    }
}
