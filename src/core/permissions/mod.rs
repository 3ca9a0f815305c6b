//! Permission oracle contract.
//!
//! All role knowledge (admin, team leader, department scoping) lives behind
//! this single predicate so the engine's transition logic stays role-free.
//! Structural rules that are part of the workflow itself (only the assignee
//! accepts, only the assigner arbitrates, only the creator decides claims)
//! remain in the engine.

use crate::core::entities::{ActorId, Task};
use crate::core::types::Operation;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("permission oracle unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Pure predicate: may `actor` perform `operation` on `task`?
    async fn can_perform(
        &self,
        actor: ActorId,
        task: &Task,
        operation: Operation,
    ) -> Result<bool, OracleError>;
}

/// Grants every request. Suitable for tests and single-tenant embedders
/// that enforce permissions upstream.
pub struct AllowAll;

#[async_trait]
impl PermissionOracle for AllowAll {
    async fn can_perform(
        &self,
        _actor: ActorId,
        _task: &Task,
        _operation: Operation,
    ) -> Result<bool, OracleError> {
        Ok(true)
    }
}
