//! Durable job queues and load balancing across them.
//!
//! Jobs are rows in a shared `jobs` table keyed by queue name. Producers push
//! a [`QueuedJob`]; each queue worker pops the oldest row of its queue. The
//! [`QueueBalancer`] spreads single-photo work over the photo queues and
//! reports how long a new request will wait.

mod balancer;
mod job;
mod sqlite;
mod store;

pub use balancer::{QueueBalancer, QueueEstimate};
pub use job::{PhotoRequest, QueuedJob};
pub use sqlite::SqliteJobQueue;
pub use store::{JobQueue, QueueEntry, QueueError};
