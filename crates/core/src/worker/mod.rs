//! External worker invocation.
//!
//! Each image-processing service is a script run inside its own conda
//! environment. Batch runs process a whole ticket and have no timeout;
//! photo runs process one file, are bounded by a timeout, and report their
//! result as a JSON object on standard output.

mod color;
mod conda;
mod error;
mod output;
mod traits;

pub use color::{BackgroundColor, ColorError};
pub use conda::{CommandLine, CondaWorkerInvoker};
pub use error::WorkerError;
pub use output::{
    shorten, truncate_chars, PhotoWorkerResponse, WorkerOutput, DIAGNOSTIC_EXCERPT_CHARS,
    LOG_EXCERPT_CHARS,
};
pub use traits::{WorkerInvoker, WorkerRequest};
