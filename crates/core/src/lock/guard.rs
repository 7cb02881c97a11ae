use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{LockError, TaskLock};

/// Holds a lock entry and releases it when dropped.
pub struct TaskLockGuard {
    lock: Arc<dyn TaskLock>,
    key: String,
}

impl TaskLockGuard {
    /// Returns `None` when the key is already held.
    pub fn try_acquire(
        lock: Arc<dyn TaskLock>,
        key: impl Into<String>,
        ttl: Duration,
    ) -> Result<Option<Self>, LockError> {
        let key = key.into();
        if lock.acquire(&key, ttl)? {
            Ok(Some(Self { lock, key }))
        } else {
            Ok(None)
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for TaskLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to release task lock");
        }
    }
}
