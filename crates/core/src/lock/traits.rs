use std::time::Duration;

use thiserror::Error;

use crate::service::ServiceKind;

/// Errors from a lock backend.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock database error: {0}")]
    Database(String),
}

/// Backend for short-lived task locks.
pub trait TaskLock: Send + Sync {
    /// Creates the entry for `key` unless a live one exists.
    ///
    /// Returns `false` when another holder owns the key.
    fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Removes the entry for `key`. Releasing an absent key is a no-op.
    fn release(&self, key: &str) -> Result<(), LockError>;
}

/// Lock key for a unit of work: the service plus an md5 fingerprint of the
/// source string.
pub fn lock_key(service: ServiceKind, source: &str) -> String {
    format!("naiade_job:{}:{:x}", service, md5::compute(source.as_bytes()))
}
