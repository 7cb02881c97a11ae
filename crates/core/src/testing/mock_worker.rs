//! Mock worker invoker for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::service::ServiceKind;
use crate::worker::{WorkerError, WorkerInvoker, WorkerOutput, WorkerRequest};

type Effect = Arc<dyn Fn(ServiceKind, &WorkerRequest) + Send + Sync>;

/// A recorded worker invocation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvocation {
    pub service: ServiceKind,
    pub request: WorkerRequest,
}

/// Mock implementation of the WorkerInvoker trait.
///
/// Records every call, optionally runs a side effect (to fake the files a
/// real worker would write), waits for a configurable delay and returns a
/// fixed output.
///
/// # Example
///
/// ```rust,ignore
/// use naiade_core::testing::MockWorkerInvoker;
///
/// let invoker = MockWorkerInvoker::new()
///     .with_output(MockWorkerInvoker::photo_success("out.png"))
///     .with_effect(|_, _| std::fs::write("/srv/rembg/output/out.png", b"png").unwrap());
///
/// // ... run a processor ...
///
/// assert_eq!(invoker.call_count().await, 1);
/// ```
pub struct MockWorkerInvoker {
    calls: Arc<RwLock<Vec<RecordedInvocation>>>,
    output: WorkerOutput,
    effect: Option<Effect>,
    delay: Duration,
}

impl Default for MockWorkerInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorkerInvoker {
    /// A mock whose every run exits 0 with empty output.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            output: WorkerOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            },
            effect: None,
            delay: Duration::ZERO,
        }
    }

    /// Output of a single-photo run that produced `processed_image`.
    pub fn photo_success(processed_image: &str) -> WorkerOutput {
        WorkerOutput {
            success: true,
            stdout: serde_json::json!({
                "success": true,
                "processed_image": processed_image,
                "message": "ok",
            })
            .to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Output of a single-photo run that reported `success: false`.
    pub fn photo_rejection(message: &str) -> WorkerOutput {
        WorkerOutput {
            success: true,
            stdout: serde_json::json!({"success": false, "message": message}).to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn with_output(mut self, output: WorkerOutput) -> Self {
        self.output = output;
        self
    }

    /// Runs `effect` on every call before returning.
    pub fn with_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(ServiceKind, &WorkerRequest) + Send + Sync + 'static,
    {
        self.effect = Some(Arc::new(effect));
        self
    }

    /// Simulated run time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get all recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.calls.read().await.clone()
    }

    /// Get the number of invocations.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl WorkerInvoker for MockWorkerInvoker {
    async fn run(
        &self,
        service: ServiceKind,
        request: &WorkerRequest,
    ) -> Result<WorkerOutput, WorkerError> {
        self.calls.write().await.push(RecordedInvocation {
            service,
            request: request.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(effect) = &self.effect {
            effect(service, request);
        }

        Ok(self.output.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
