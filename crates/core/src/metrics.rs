//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket tasks (terminal outcomes)
//! - Worker processes (runs, duration)
//! - Single-photo requests and lock contention
//! - File transfers (fallbacks, failures)
//! - Queue dispatch

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Tasks
// =============================================================================

/// Tickets that reached a terminal status.
pub static TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "naiade_tasks_finished_total",
            "Tickets that reached a terminal status",
        ),
        &["status"], // "completed", "failed"
    )
    .unwrap()
});

// =============================================================================
// Workers
// =============================================================================

/// Worker process runs by service and result.
pub static WORKER_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("naiade_worker_runs_total", "Worker process runs"),
        &["service", "result"], // "success", "failure", "timeout", "spawn_error"
    )
    .unwrap()
});

/// Worker process wall time.
pub static WORKER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "naiade_worker_duration_seconds",
            "Wall time of worker processes",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["service", "mode"],
    )
    .unwrap()
});

// =============================================================================
// Single photo
// =============================================================================

/// Single-photo requests by service and outcome.
pub static PHOTO_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("naiade_photo_requests_total", "Single-photo requests"),
        &["service", "outcome"], // "succeeded", "failed", "skipped"
    )
    .unwrap()
});

/// Requests skipped because the same work was already in flight.
pub static LOCK_CONTENTION: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "naiade_lock_contention_total",
            "Requests skipped because an identical one held the lock",
        ),
        &["service"],
    )
    .unwrap()
});

// =============================================================================
// Transfers
// =============================================================================

/// Moves that fell back to copy-then-delete.
pub static TRANSFER_FALLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "naiade_transfer_copy_fallbacks_total",
        "File moves that fell back to copy-then-delete",
    )
    .unwrap()
});

/// Moves that exhausted every strategy.
pub static TRANSFER_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "naiade_transfer_failures_total",
        "File moves that exhausted rename and copy retries",
    )
    .unwrap()
});

// =============================================================================
// Queues
// =============================================================================

/// Jobs pushed, by queue.
pub static JOBS_DISPATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("naiade_jobs_dispatched_total", "Jobs pushed onto a queue"),
        &["queue"],
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TASKS_FINISHED.clone()),
        Box::new(WORKER_RUNS.clone()),
        Box::new(WORKER_DURATION.clone()),
        Box::new(PHOTO_REQUESTS.clone()),
        Box::new(LOCK_CONTENTION.clone()),
        Box::new(TRANSFER_FALLBACKS.clone()),
        Box::new(TRANSFER_FAILURES.clone()),
        Box::new(JOBS_DISPATCHED.clone()),
    ]
}
