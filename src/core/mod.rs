pub mod audit;
pub mod config;
pub mod directory;
pub mod engine;
pub mod entities;
pub mod error;
pub mod notify;
pub mod permissions;
pub mod store;
pub mod types;

pub use audit::{AuditRecord, AuditSink, EntityKind, MemoryAuditSink};
pub use config::{ConfigLoader, ConfigValidator, ForemanConfig};
pub use directory::{ActorDirectory, EmptyDirectory};
pub use engine::{EngineSettings, WorkflowEngine};
pub use entities::{ActorId, Assignment, AssignmentId, NewTask, StatusChange, Task, TaskId};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter};
pub use notify::{
    ActionTaken, MemoryNotificationSink, Notification, NotificationKind, NotificationMeta,
    NotificationSink,
};
pub use permissions::{AllowAll, PermissionOracle};
pub use store::{MemoryStore, WorkflowStore};
pub use types::*;
