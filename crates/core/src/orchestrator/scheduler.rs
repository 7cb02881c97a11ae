//! Hand-off from request handlers to the queues.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::types::OrchestratorError;
use crate::metrics::JOBS_DISPATCHED;
use crate::queue::{JobQueue, PhotoRequest, QueueBalancer, QueueEstimate, QueuedJob};
use crate::task::Task;

/// Schedules a freshly created task for processing.
///
/// Handlers call this explicitly after creating the record; creating a
/// record alone starts nothing.
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, task: &Task) -> Result<(), OrchestratorError>;
}

/// Schedules tasks by pushing a ticket job onto a named queue.
pub struct QueueScheduler {
    queue: Arc<dyn JobQueue>,
    queue_name: String,
}

impl QueueScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }
}

impl TaskScheduler for QueueScheduler {
    fn schedule(&self, task: &Task) -> Result<(), OrchestratorError> {
        let job = QueuedJob::Ticket {
            ticket: task.ticket.clone(),
            service: task.service,
        };
        let id = self.queue.push(&self.queue_name, &job)?;
        JOBS_DISPATCHED
            .with_label_values(&[self.queue_name.as_str()])
            .inc();
        info!(ticket = %task.ticket, queue = %self.queue_name, job_id = id, "Ticket scheduled");
        Ok(())
    }
}

/// Where a photo request was queued and what it waits for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub queue: String,
    pub job_id: i64,
    pub estimate: QueueEstimate,
}

/// Queues single-photo requests on the least-loaded photo queue.
pub struct PhotoDispatcher {
    queue: Arc<dyn JobQueue>,
    balancer: QueueBalancer,
    candidates: Vec<String>,
}

impl PhotoDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>, candidates: Vec<String>) -> Self {
        Self {
            balancer: QueueBalancer::new(queue.clone()),
            queue,
            candidates,
        }
    }

    pub fn dispatch(&self, request: PhotoRequest) -> Result<DispatchReceipt, OrchestratorError> {
        let queue = self.balancer.select_queue(&self.candidates)?.to_string();
        let service = request.service;
        let job_id = self.queue.push(&queue, &QueuedJob::Photo(request))?;
        JOBS_DISPATCHED.with_label_values(&[queue.as_str()]).inc();

        let estimate = self.balancer.estimate(&queue)?;
        info!(
            service = %service,
            queue = %queue,
            job_id,
            pending = estimate.count_total,
            wait_secs = estimate.total_estimated_wait_time,
            "Photo request queued"
        );

        Ok(DispatchReceipt {
            queue,
            job_id,
            estimate,
        })
    }
}
