//! Task orchestration.
//!
//! - [`TicketProcessor`]: validates a ticket directory, stages its images,
//!   runs the batch worker and delivers results, recording every step on
//!   the task
//! - [`PhotoProcessor`]: lock-guarded single-photo run with a push
//!   notification of the result
//! - [`QueueScheduler`] and [`PhotoDispatcher`]: put work on the queues
//! - [`QueueWorker`]: per-queue loops that pull jobs and hand them to a
//!   [`JobHandler`]
//!
//! Nothing inside a processor escapes as a panic or an unhandled error:
//! failures become a `FAILED` task or a failure notification.

mod photo;
mod queue_worker;
mod scheduler;
mod ticket;
mod types;

pub use photo::{PhotoProcessor, PhotoProcessorDeps};
pub use queue_worker::{JobHandler, NaiadeJobHandler, QueueWorker};
pub use scheduler::{DispatchReceipt, PhotoDispatcher, QueueScheduler, TaskScheduler};
pub use ticket::TicketProcessor;
pub use types::{OrchestratorError, PhotoOutcome, TicketOutcome};
