//! Durable task records for ticket processing.
//!
//! A task tracks one ticket through `PENDING -> IN_PROGRESS -> COMPLETED` or
//! `FAILED`. The store validates every transition; status writes do not
//! trigger any other side effect.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTaskStore;
pub use store::{CreateTaskRequest, TaskError, TaskFilter, TaskStore};
pub use types::{Task, TaskStatus, UnknownStatus, MAX_MESSAGE_CHARS};
