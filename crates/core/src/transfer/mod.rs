//! File transfer between the shared file server and worker directories.
//!
//! Network-mounted volumes have weak locking and cross-volume renames fail
//! transiently, so every move goes through the same policy:
//!
//! - Never overwrite: a taken destination gets a `_<n>` suffix before the
//!   extension
//! - Rename first, retried with a fixed delay
//! - Then copy-then-delete with the same retries; a source that cannot be
//!   removed after a good copy is logged and the move still succeeds
//!
//! Directory helpers apply the single-file move to every image (or every
//! file) of a directory and keep going past per-file failures.

mod engine;
mod error;

pub use engine::{is_image, FileTransfer, TransferReport, IMAGE_EXTENSIONS};
pub use error::TransferError;
