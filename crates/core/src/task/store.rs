//! Task storage trait and request types.

use thiserror::Error;

use super::{Task, TaskStatus};
use crate::service::ServiceKind;

/// Error type for task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A task for this ticket already exists.
    #[error("Task already exists for ticket {0}")]
    AlreadyExists(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    /// The requested status change is not part of the lifecycle.
    #[error("Cannot move ticket {ticket} from {from} to {to}")]
    InvalidTransition {
        ticket: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new task.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    pub ticket: String,
    pub service: ServiceKind,
}

impl CreateTaskRequest {
    pub fn new(ticket: impl Into<String>, service: ServiceKind) -> Self {
        Self {
            ticket: ticket.into(),
            service,
        }
    }
}

/// Filter for querying tasks.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for task storage backends.
///
/// Soft-deleted tasks are invisible to every read.
pub trait TaskStore: Send + Sync {
    /// Create a `PENDING` task. Fails with `AlreadyExists` for a known ticket.
    fn create(&self, request: CreateTaskRequest) -> Result<Task, TaskError>;

    fn get(&self, ticket: &str) -> Result<Option<Task>, TaskError>;

    /// List tasks matching the filter, oldest first.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError>;

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError>;

    /// Move a task to `to`, replacing its message with `message` (truncated).
    fn transition(
        &self,
        ticket: &str,
        to: TaskStatus,
        message: Option<&str>,
    ) -> Result<Task, TaskError>;

    /// Mark a task as deleted without removing the row.
    fn soft_delete(&self, ticket: &str) -> Result<Task, TaskError>;
}
