//! Durable storage for processed single-photo results.

mod filesystem;

pub use filesystem::FsResultStore;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::service::ServiceKind;
use crate::transfer::TransferError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Processed file has no usable name: {0}")]
    InvalidName(PathBuf),

    #[error("Failed to store processed file: {0}")]
    Transfer(#[from] TransferError),
}

/// Where a stored result ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub path: PathBuf,
    /// Publicly reachable URL of `path`.
    pub url: String,
}

/// Takes ownership of a processed file and makes it publicly reachable.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Moves `file` into durable storage. The source path is gone afterwards.
    async fn store(&self, service: ServiceKind, file: &Path) -> Result<StoredResult, StorageError>;
}
