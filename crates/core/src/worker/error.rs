//! Error types for the worker module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a worker or reading its result.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The process could not be started.
    #[error("Failed to start worker {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process outlived its timeout and was killed.
    #[error("Worker timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The process exited unsuccessfully.
    #[error("Service process failed. ExitCode={}{}", exit_code_label(.exit_code), stderr_suffix(.stderr))]
    ExitFailure {
        exit_code: Option<i32>,
        /// Bounded excerpt of stderr.
        stderr: String,
    },

    /// Standard output is not the expected JSON object.
    #[error("Malformed worker response: {reason}")]
    MalformedResponse { reason: String },

    /// The worker reported `success: false`.
    #[error("{message}")]
    Rejected { message: String },

    /// I/O error while waiting on the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" stderr: {stderr}")
    }
}
