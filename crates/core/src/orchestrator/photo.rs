//! Single-photo processing with result notification.

use std::path::PathBuf;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::types::{OrchestratorError, PhotoOutcome};
use crate::config::ServicesConfig;
use crate::lock::{lock_key, TaskLock, TaskLockGuard};
use crate::metrics::{LOCK_CONTENTION, PHOTO_REQUESTS};
use crate::notify::{Envelope, Notification, NotificationEvent, Notifier};
use crate::queue::PhotoRequest;
use crate::source::{is_inline, SourceFetcher};
use crate::storage::ResultStore;
use crate::transfer::FileTransfer;
use crate::worker::{BackgroundColor, WorkerInvoker, WorkerRequest};

const SUCCESS_MESSAGE: &str = "Photo processed successfully";

/// Collaborators of a [`PhotoProcessor`].
pub struct PhotoProcessorDeps {
    pub invoker: Arc<dyn WorkerInvoker>,
    pub lock: Arc<dyn TaskLock>,
    pub fetcher: SourceFetcher,
    pub results: Arc<dyn ResultStore>,
    pub notifier: Arc<dyn Notifier>,
    pub transfer: FileTransfer,
}

/// Runs one photo through a service and pushes the result to the request's
/// channel.
///
/// Identical requests (same service and source) are serialized by the task
/// lock; a duplicate that arrives while the first one runs is dropped.
/// Downloaded inputs and worker outputs are deleted whatever the outcome.
pub struct PhotoProcessor {
    deps: PhotoProcessorDeps,
    services: ServicesConfig,
    lock_ttl: Duration,
}

struct Processed {
    processed_url: String,
}

impl PhotoProcessor {
    pub fn new(deps: PhotoProcessorDeps, services: ServicesConfig, lock_ttl: Duration) -> Self {
        Self {
            deps,
            services,
            lock_ttl,
        }
    }

    pub async fn process(&self, request: &PhotoRequest) -> PhotoOutcome {
        let service = request.service;
        let key = lock_key(service, &request.source);

        let _guard = match TaskLockGuard::try_acquire(self.deps.lock.clone(), key, self.lock_ttl) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                warn!(service = %service, source = %source_label(&request.source), "Job already running, skipping");
                LOCK_CONTENTION.with_label_values(&[service.as_str()]).inc();
                PHOTO_REQUESTS
                    .with_label_values(&[service.as_str(), "skipped"])
                    .inc();
                return PhotoOutcome::Skipped;
            }
            Err(e) => {
                return self
                    .finish(request, Instant::now(), Err(OrchestratorError::from(e)))
                    .await;
            }
        };

        let started = Instant::now();
        let mut transient: Vec<PathBuf> = Vec::new();

        let result = AssertUnwindSafe(self.run(request, &mut transient))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(OrchestratorError::from_panic(panic)));

        for path in &transient {
            if let Err(e) = self.deps.transfer.remove_file(path).await {
                warn!(path = %path.display(), "Failed to remove transient file: {}", e);
            }
        }

        self.finish(request, started, result).await
    }

    async fn run(
        &self,
        request: &PhotoRequest,
        transient: &mut Vec<PathBuf>,
    ) -> Result<Processed, OrchestratorError> {
        let service = request.service;
        let service_config = self.services.get(service);

        let background = if service.accepts_background_color() {
            Some(BackgroundColor::parse_optional(request.bg_color.as_deref())?)
        } else {
            None
        };

        let acquired = self
            .deps
            .fetcher
            .fetch(&request.source, &service_config.photo_input_dir())
            .await?;
        transient.push(acquired.path.clone());

        let output = self
            .deps
            .invoker
            .run(
                service,
                &WorkerRequest::Photo {
                    filename: acquired.filename.clone(),
                    background,
                },
            )
            .await?;

        let response = output.photo_response()?;
        let processed_image = response.processed_image.unwrap_or_default();
        let processed_path = service_config.photo_output_dir().join(&processed_image);
        transient.push(processed_path.clone());

        let stored = self.deps.results.store(service, &processed_path).await?;

        Ok(Processed {
            processed_url: stored.url,
        })
    }

    async fn finish(
        &self,
        request: &PhotoRequest,
        started: Instant,
        result: Result<Processed, OrchestratorError>,
    ) -> PhotoOutcome {
        let service = request.service;

        let (outcome, envelope) = match result {
            Ok(processed) => {
                let elapsed = started.elapsed().as_secs_f64();
                info!(service = %service, elapsed_secs = elapsed, url = %processed.processed_url, "Photo processed");
                PHOTO_REQUESTS
                    .with_label_values(&[service.as_str(), "succeeded"])
                    .inc();

                let mut data = json!({
                    "service": service,
                    "time": elapsed,
                    "original_url": original_url(&request.source),
                    "processed_url": processed.processed_url,
                });
                add_indices(&mut data, request);

                (
                    PhotoOutcome::Succeeded {
                        processed_url: processed.processed_url,
                    },
                    Envelope::ok(SUCCESS_MESSAGE, data),
                )
            }
            Err(e) => {
                error!(service = %service, source = %source_label(&request.source), error = ?e, "Photo processing failed: {}", e);
                PHOTO_REQUESTS
                    .with_label_values(&[service.as_str(), "failed"])
                    .inc();

                let message = e.to_string();
                let data = if request.canvas_index.is_some() || request.element_index.is_some() {
                    let mut data = json!({});
                    add_indices(&mut data, request);
                    Some(data)
                } else {
                    None
                };

                (
                    PhotoOutcome::Failed {
                        message: message.clone(),
                    },
                    Envelope::failure(message, data),
                )
            }
        };

        match Notification::new(&request.channel, NotificationEvent::ServiceResponse, &envelope) {
            Ok(notification) => {
                if let Err(e) = self.deps.notifier.notify(notification).await {
                    warn!(channel = %request.channel, "Failed to push result: {}", e);
                }
            }
            Err(e) => warn!(channel = %request.channel, "Failed to encode result: {}", e),
        }

        outcome
    }
}

fn add_indices(data: &mut Value, request: &PhotoRequest) {
    if let Value::Object(map) = data {
        if let Some(index) = request.canvas_index {
            map.insert("canvasIndex".to_string(), json!(index));
        }
        if let Some(index) = request.element_index {
            map.insert("elementIndex".to_string(), json!(index));
        }
    }
}

/// Inline payloads are not echoed back.
fn original_url(source: &str) -> Value {
    if is_inline(source) {
        Value::Null
    } else {
        Value::String(source.to_string())
    }
}

/// Short form of a source for log lines.
fn source_label(source: &str) -> String {
    if is_inline(source) {
        format!("<inline {} bytes>", source.len())
    } else {
        source.to_string()
    }
}
