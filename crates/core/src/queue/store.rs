use chrono::{DateTime, Utc};
use thiserror::Error;

use super::QueuedJob;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("No candidate queues given")]
    NoCandidates,

    #[error("Failed to encode job: {0}")]
    Encode(String),

    #[error("Failed to decode job {id}: {reason}")]
    Decode { id: i64, reason: String },

    #[error("Queue database error: {0}")]
    Database(String),
}

/// A popped queue record.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue: String,
    /// Raw JSON payload.
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn decode(&self) -> Result<QueuedJob, QueueError> {
        serde_json::from_str(&self.payload).map_err(|e| QueueError::Decode {
            id: self.id,
            reason: e.to_string(),
        })
    }
}

/// Storage for named FIFO job queues.
pub trait JobQueue: Send + Sync {
    /// Append a job to `queue`. Returns the record id.
    fn push(&self, queue: &str, job: &QueuedJob) -> Result<i64, QueueError>;

    /// Remove and return the oldest record of `queue`.
    fn pop(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError>;

    /// Number of records waiting in `queue`.
    fn count(&self, queue: &str) -> Result<u64, QueueError>;

    /// Raw payloads waiting in `queue`, oldest first.
    fn pending_payloads(&self, queue: &str) -> Result<Vec<String>, QueueError>;
}
