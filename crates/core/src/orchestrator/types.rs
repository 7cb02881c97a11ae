//! Types shared by the task processors.

use std::any::Any;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during orchestration.
///
/// Display strings end up verbatim in task messages and client
/// notifications.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The task cannot start: missing directory, no images, bad input.
    #[error("{0}")]
    Precondition(String),

    /// The worker succeeded but left no output directory.
    #[error("Worker output directory not found: {}", .path.display())]
    MissingOutput { path: PathBuf },

    /// A processing stage panicked.
    #[error("Unexpected error: {0}")]
    Panic(String),

    #[error(transparent)]
    Task(#[from] crate::task::TaskError),

    #[error(transparent)]
    Queue(#[from] crate::queue::QueueError),

    #[error(transparent)]
    Transfer(#[from] crate::transfer::TransferError),

    #[error(transparent)]
    Worker(#[from] crate::worker::WorkerError),

    #[error("Invalid background color: {0}")]
    Color(#[from] crate::worker::ColorError),

    #[error(transparent)]
    Source(#[from] crate::source::SourceError),

    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),

    #[error(transparent)]
    Lock(#[from] crate::lock::LockError),

    #[error(transparent)]
    Notify(#[from] crate::notify::NotifyError),
}

impl OrchestratorError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self::Panic(message)
    }
}

/// How a ticket run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketOutcome {
    /// The task was not `PENDING`; nothing was done.
    Skipped,
    Completed { processed: usize },
    Failed { message: String },
}

/// How a single-photo request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoOutcome {
    /// Identical work already held the lock.
    Skipped,
    Succeeded { processed_url: String },
    Failed { message: String },
}
