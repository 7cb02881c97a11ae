//! Batch processing of one ticket directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::fs;
use tracing::{error, info, warn};

use super::types::{OrchestratorError, TicketOutcome};
use crate::config::{FileServerConfig, ServicesConfig};
use crate::metrics::TASKS_FINISHED;
use crate::service::ServiceKind;
use crate::task::{TaskError, TaskStatus, TaskStore};
use crate::transfer::FileTransfer;
use crate::worker::{WorkerInvoker, WorkerRequest};

/// Runs a ticket through staging, the batch worker and delivery.
///
/// Every run leaves the task `COMPLETED` or `FAILED`, and always removes the
/// service's staging and output directories for the ticket. On failure the
/// original images are kept in a `failed_<ticket>_<timestamp>` directory
/// next to the ticket directory.
pub struct TicketProcessor {
    tasks: Arc<dyn TaskStore>,
    invoker: Arc<dyn WorkerInvoker>,
    transfer: FileTransfer,
    file_server: FileServerConfig,
    services: ServicesConfig,
}

impl TicketProcessor {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        invoker: Arc<dyn WorkerInvoker>,
        transfer: FileTransfer,
        file_server: FileServerConfig,
        services: ServicesConfig,
    ) -> Self {
        Self {
            tasks,
            invoker,
            transfer,
            file_server,
            services,
        }
    }

    /// Processes `ticket`. Only `PENDING` tasks are picked up.
    ///
    /// Processing failures become a `FAILED` task and an `Ok` outcome; `Err`
    /// means the task record itself could not be read or written.
    pub async fn process(&self, ticket: &str) -> Result<TicketOutcome, OrchestratorError> {
        let task = self
            .tasks
            .get(ticket)?
            .ok_or_else(|| TaskError::NotFound(ticket.to_string()))?;

        if task.status != TaskStatus::Pending {
            warn!(ticket = %ticket, status = %task.status, "Task is not pending, skipping");
            return Ok(TicketOutcome::Skipped);
        }

        let ticket_dir = self.file_server.ticket_dir(ticket);
        info!(ticket = %ticket, service = %task.service, dir = %ticket_dir.display(), "Processing ticket");

        if let Err(e) = self.check_preconditions(&ticket_dir).await {
            let message = e.to_string();
            warn!(ticket = %ticket, "Precondition failed: {}", message);
            self.tasks
                .transition(ticket, TaskStatus::Failed, Some(&message))?;
            TASKS_FINISHED.with_label_values(&["failed"]).inc();
            return Ok(TicketOutcome::Failed { message });
        }

        self.tasks
            .transition(ticket, TaskStatus::InProgress, None)?;

        let service_config = self.services.get(task.service);
        let staging_dir = service_config.staging_dir(ticket);
        let output_dir = service_config.output_dir(ticket);

        let result = AssertUnwindSafe(self.run_stages(
            ticket,
            task.service,
            &ticket_dir,
            &staging_dir,
            &output_dir,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(OrchestratorError::from_panic(panic)));

        // Cleanup runs before the final status write is allowed to fail.
        let (recorded, outcome) = match result {
            Ok(processed) => {
                let message = format!("Processed {processed} images");
                let recorded = self
                    .tasks
                    .transition(ticket, TaskStatus::Completed, Some(&message));
                if recorded.is_ok() {
                    TASKS_FINISHED.with_label_values(&["completed"]).inc();
                    info!(ticket = %ticket, processed, "Ticket completed");
                }
                (recorded, TicketOutcome::Completed { processed })
            }
            Err(e) => {
                error!(ticket = %ticket, service = %task.service, error = ?e, "Ticket failed: {}", e);
                let message = e.to_string();
                let recorded = self
                    .tasks
                    .transition(ticket, TaskStatus::Failed, Some(&message));
                TASKS_FINISHED.with_label_values(&["failed"]).inc();
                self.quarantine(ticket, &ticket_dir, &staging_dir).await;
                (recorded, TicketOutcome::Failed { message })
            }
        };

        self.cleanup(ticket, &staging_dir, &output_dir).await;
        recorded?;
        Ok(outcome)
    }

    async fn check_preconditions(&self, ticket_dir: &Path) -> Result<(), OrchestratorError> {
        let accessible = fs::metadata(ticket_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        let images = if accessible {
            self.transfer.list_images(ticket_dir).await.ok()
        } else {
            None
        };

        match images {
            None => Err(OrchestratorError::Precondition(format!(
                "Ticket directory does not exist or is not accessible: {}",
                ticket_dir.display()
            ))),
            Some(images) if images.is_empty() => Err(OrchestratorError::Precondition(format!(
                "No image files found in the ticket directory: {}",
                ticket_dir.display()
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Staging, worker run and delivery. Returns how many images came back.
    async fn run_stages(
        &self,
        ticket: &str,
        service: ServiceKind,
        ticket_dir: &Path,
        staging_dir: &Path,
        output_dir: &Path,
    ) -> Result<usize, OrchestratorError> {
        let staged = self.transfer.move_images(ticket_dir, staging_dir).await?;
        if staged.moved.is_empty() {
            return Err(OrchestratorError::Precondition(format!(
                "No images could be moved to the staging directory: {}",
                staging_dir.display()
            )));
        }
        if !staged.is_complete() {
            warn!(ticket = %ticket, failed = staged.failed.len(), "Some images were not staged");
        }
        info!(ticket = %ticket, staged = staged.moved.len(), "Images staged");

        self.invoker
            .run(
                service,
                &WorkerRequest::Batch {
                    ticket: ticket.to_string(),
                },
            )
            .await?
            .into_result()?;

        let has_output = fs::metadata(output_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !has_output {
            return Err(OrchestratorError::MissingOutput {
                path: output_dir.to_path_buf(),
            });
        }

        let delivered = self.transfer.move_images(output_dir, ticket_dir).await?;
        if !delivered.is_complete() {
            warn!(ticket = %ticket, failed = delivered.failed.len(), "Some results were not delivered");
        }
        Ok(delivered.moved.len())
    }

    /// Moves originals from the ticket and staging directories into a
    /// sibling `failed_<ticket>_<timestamp>` directory.
    async fn quarantine(&self, ticket: &str, ticket_dir: &Path, staging_dir: &Path) {
        let failed_dir = failed_dir_for(ticket_dir, ticket);

        for dir in [ticket_dir, staging_dir] {
            if fs::metadata(dir).await.is_err() {
                continue;
            }
            match self.transfer.move_all(dir, &failed_dir).await {
                Ok(report) if !report.is_complete() => {
                    warn!(ticket = %ticket, dir = %dir.display(), failed = report.failed.len(), "Some files could not be quarantined");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(ticket = %ticket, dir = %dir.display(), "Failed to quarantine files: {}", e);
                }
            }
        }

        // Only succeeds once the directory is empty.
        if fs::remove_dir(ticket_dir).await.is_ok() {
            info!(ticket = %ticket, "Removed emptied ticket directory");
        }
        info!(ticket = %ticket, dir = %failed_dir.display(), "Originals kept for inspection");
    }

    async fn cleanup(&self, ticket: &str, staging_dir: &Path, output_dir: &Path) {
        for dir in [staging_dir, output_dir] {
            if let Err(e) = self.transfer.remove_dir_all(dir).await {
                warn!(ticket = %ticket, dir = %dir.display(), "Cleanup failed: {}", e);
            }
        }
    }
}

fn failed_dir_for(ticket_dir: &Path, ticket: &str) -> PathBuf {
    let name = format!("failed_{}_{}", ticket, Utc::now().format("%Y%m%d_%H%M%S"));
    match ticket_dir.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
