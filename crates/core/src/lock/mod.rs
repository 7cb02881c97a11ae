//! Short-lived mutual exclusion for single-photo work.
//!
//! A lock entry marks one (service, source) pair as in flight. Acquisition is
//! an atomic create-if-absent with a TTL, so a crashed holder only blocks the
//! same work until the entry expires. Contention is not an error: the caller
//! skips the duplicate request.

mod guard;
mod memory;
mod sqlite;
mod traits;

pub use guard::TaskLockGuard;
pub use memory::MemoryTaskLock;
pub use sqlite::SqliteTaskLock;
pub use traits::{lock_key, LockError, TaskLock};
