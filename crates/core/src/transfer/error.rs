//! Error types for the transfer module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while moving files between directories.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Source file not found.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Every `_<n>` suffix up to the configured bound is taken.
    #[error("No free destination name for {path} after {attempts} attempts")]
    NoUniqueName { path: PathBuf, attempts: u32 },

    /// Failed to create a destination directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Both rename and copy-then-delete ran out of attempts.
    #[error("Failed to move {from} to {to} after {attempts} attempts per strategy")]
    Exhausted {
        from: PathBuf,
        to: PathBuf,
        attempts: u32,
        #[source]
        error: std::io::Error,
    },

    /// Failed to list a directory.
    #[error("Failed to read directory: {path}")]
    ReadDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove a file or directory.
    #[error("Failed to remove {path}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
