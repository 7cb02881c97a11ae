use async_trait::async_trait;

use super::color::BackgroundColor;
use super::error::WorkerError;
use super::output::WorkerOutput;
use crate::service::ServiceKind;

/// What a worker is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRequest {
    /// Process every staged image of a ticket. Runs without a timeout.
    Batch { ticket: String },
    /// Process one file from the service's photo input directory.
    Photo {
        filename: String,
        /// Only passed to services that accept it.
        background: Option<BackgroundColor>,
    },
}

impl WorkerRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            WorkerRequest::Batch { .. } => "batch",
            WorkerRequest::Photo { .. } => "photo",
        }
    }
}

/// Runs an external image-processing worker.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    /// Runs the worker for `service` to completion (or timeout) and returns
    /// its captured output. A non-zero exit is returned as `Ok` with
    /// `success == false`; `Err` means the process could not be run or
    /// supervised.
    async fn run(
        &self,
        service: ServiceKind,
        request: &WorkerRequest,
    ) -> Result<WorkerOutput, WorkerError>;

    /// Name of this invoker for logging.
    fn name(&self) -> &str;
}
