//! Background loops draining the job queues.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::photo::PhotoProcessor;
use super::ticket::TicketProcessor;
use super::types::{OrchestratorError, PhotoOutcome, TicketOutcome};
use crate::queue::{JobQueue, QueuedJob};

/// Processes one dequeued job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: QueuedJob) -> Result<(), OrchestratorError>;
}

/// Routes ticket jobs and photo jobs to their processors.
pub struct NaiadeJobHandler {
    tickets: Arc<TicketProcessor>,
    photos: Arc<PhotoProcessor>,
}

impl NaiadeJobHandler {
    pub fn new(tickets: Arc<TicketProcessor>, photos: Arc<PhotoProcessor>) -> Self {
        Self { tickets, photos }
    }
}

#[async_trait]
impl JobHandler for NaiadeJobHandler {
    async fn handle(&self, job: QueuedJob) -> Result<(), OrchestratorError> {
        match job {
            QueuedJob::Ticket { ticket, .. } => {
                match self.tickets.process(&ticket).await? {
                    TicketOutcome::Failed { message } => {
                        debug!(ticket = %ticket, "Ticket job ended in failure: {}", message)
                    }
                    outcome => debug!(ticket = %ticket, ?outcome, "Ticket job done"),
                }
                Ok(())
            }
            QueuedJob::Photo(request) => {
                if let PhotoOutcome::Failed { message } = self.photos.process(&request).await {
                    debug!(channel = %request.channel, "Photo job ended in failure: {}", message);
                }
                Ok(())
            }
        }
    }
}

/// One polling loop per named queue. Each loop runs a job to completion
/// before pulling the next.
pub struct QueueWorker {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    queue_names: Vec<String>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        queue_names: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            queue,
            handler,
            queue_names,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawns the queue loops.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Queue workers already running");
            return;
        }

        for name in &self.queue_names {
            self.spawn_loop(name.clone());
        }
        info!(queues = ?self.queue_names, "Queue workers started");
    }

    /// Signals every loop to stop after its current job.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Queue workers not running");
            return;
        }

        info!("Stopping queue workers");
        let _ = self.shutdown_tx.send(());

        // Give loops a moment to observe the signal
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("Queue workers stopped");
    }

    fn spawn_loop(&self, queue_name: String) {
        let running = Arc::clone(&self.running);
        let queue = Arc::clone(&self.queue);
        let handler = Arc::clone(&self.handler);
        let poll_interval = self.poll_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(queue = %queue_name, "Queue loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(queue = %queue_name, "Queue loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        // Drain before sleeping again.
                        loop {
                            match Self::process_next(&queue, &handler, &queue_name).await {
                                Ok(true) if running.load(Ordering::Relaxed) => continue,
                                Ok(_) => break,
                                Err(e) => {
                                    warn!(queue = %queue_name, "Queue error: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            info!(queue = %queue_name, "Queue loop stopped");
        });
    }

    /// Pops and handles one job of `queue_name`. Returns whether a job was
    /// found.
    pub async fn run_once(&self, queue_name: &str) -> Result<bool, OrchestratorError> {
        Self::process_next(&self.queue, &self.handler, queue_name).await
    }

    async fn process_next(
        queue: &Arc<dyn JobQueue>,
        handler: &Arc<dyn JobHandler>,
        queue_name: &str,
    ) -> Result<bool, OrchestratorError> {
        let Some(entry) = queue.pop(queue_name)? else {
            return Ok(false);
        };

        let job = match entry.decode() {
            Ok(job) => job,
            Err(e) => {
                error!(queue = %queue_name, job_id = entry.id, "Dropping undecodable job: {}", e);
                return Ok(true);
            }
        };

        debug!(queue = %queue_name, job_id = entry.id, kind = job.kind(), service = %job.service(), "Handling job");

        let result = AssertUnwindSafe(handler.handle(job))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(OrchestratorError::from_panic(panic)));

        if let Err(e) = result {
            error!(queue = %queue_name, job_id = entry.id, error = ?e, "Job failed: {}", e);
        }
        Ok(true)
    }
}
