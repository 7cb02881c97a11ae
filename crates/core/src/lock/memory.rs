//! In-process lock backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{LockError, TaskLock};

/// Lock entries held in process memory. Only serializes work within one
/// process.
#[derive(Default)]
pub struct MemoryTaskLock {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryTaskLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskLock for MemoryTaskLock {
    fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();

        if let Some(expires_at) = entries.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        entries.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    fn release(&self, key: &str) -> Result<(), LockError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let lock = MemoryTaskLock::new();
        let ttl = Duration::from_secs(10);

        assert!(lock.acquire("k", ttl).unwrap());
        assert!(!lock.acquire("k", ttl).unwrap());
        assert!(lock.acquire("other", ttl).unwrap());

        lock.release("k").unwrap();
        assert!(lock.acquire("k", ttl).unwrap());
    }

    #[test]
    fn test_expired_entry_can_be_taken() {
        let lock = MemoryTaskLock::new();
        assert!(lock.acquire("k", Duration::from_millis(1)).unwrap());
        std::thread::sleep(Duration::from_millis(10));
        assert!(lock.acquire("k", Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn test_release_is_idempotent() {
        let lock = MemoryTaskLock::new();
        lock.release("missing").unwrap();
        lock.release("missing").unwrap();
    }
}
