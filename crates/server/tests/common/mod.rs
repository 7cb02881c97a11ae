//! Common test utilities for in-process API testing.
//!
//! The fixture wires the real SQLite stores and queue behind the router.
//! Queue workers are never started, so jobs stay queued and can be
//! inspected.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use naiade_core::{
    create_authenticator, AuthConfig, Config, JobQueue, OrchestratorError, PhotoDispatcher,
    QueueError, QueueScheduler, SqliteJobQueue, SqliteTaskStore, Task, TaskScheduler,
};
use naiade_server::api::{create_router, WsBroadcaster};
use naiade_server::state::{AppServices, AppState};

/// Re-export fixtures for test convenience
pub use naiade_core::testing::fixtures;

pub const PHOTO_KEY: &str = "photo-secret";
pub const TICKET_KEY: &str = "ticket-secret";

/// Test fixture with an in-process router.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    pub queue: Arc<SqliteJobQueue>,
    pub broadcaster: WsBroadcaster,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Require [`PHOTO_KEY`] and [`TICKET_KEY`].
    pub require_keys: bool,
    /// Make every ticket scheduling attempt fail.
    pub failing_scheduler: bool,
}

/// Scheduler that always fails.
struct FailingScheduler;

impl TaskScheduler for FailingScheduler {
    fn schedule(&self, _task: &Task) -> Result<(), OrchestratorError> {
        Err(QueueError::Database("queue unavailable".to_string()).into())
    }
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    pub fn with_keys() -> Self {
        Self::with_config(TestConfig {
            require_keys: true,
            ..TestConfig::default()
        })
    }

    pub fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config: Config = fixtures::test_config(temp_dir.path());
        if test_config.require_keys {
            config.auth = AuthConfig::api_key(PHOTO_KEY);
            config.ticket_auth = AuthConfig::api_key(TICKET_KEY);
        }

        let tasks = Arc::new(
            SqliteTaskStore::new(&config.database.path).expect("Failed to create task store"),
        );
        let queue = Arc::new(
            SqliteJobQueue::new(&config.database.path).expect("Failed to create job queue"),
        );

        let scheduler: Arc<dyn TaskScheduler> = if test_config.failing_scheduler {
            Arc::new(FailingScheduler)
        } else {
            Arc::new(QueueScheduler::new(
                queue.clone(),
                config.queues.ticket_queue.clone(),
            ))
        };
        let dispatcher = Arc::new(PhotoDispatcher::new(
            queue.clone(),
            config.queues.photo_queues.clone(),
        ));
        let broadcaster = WsBroadcaster::default();

        let state = Arc::new(AppState::new(
            config.clone(),
            AppServices {
                photo_auth: Arc::from(create_authenticator(&config.auth).unwrap()),
                ticket_auth: Arc::from(create_authenticator(&config.ticket_auth).unwrap()),
                tasks,
                queue: queue.clone() as Arc<dyn JobQueue>,
                scheduler,
                dispatcher,
                broadcaster: broadcaster.clone(),
            },
        ));

        Self {
            router: create_router(state.clone()),
            state,
            queue,
            broadcaster,
            temp_dir,
        }
    }

    pub fn queue_len(&self, queue: &str) -> u64 {
        self.queue.count(queue).unwrap()
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        self.request("GET", path, None, Some(token)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), None).await
    }

    pub async fn post_with_token(&self, path: &str, body: Value, token: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), Some(token))
            .await
    }

    /// POST with no body at all.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, None).await
    }

    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), None).await
    }

    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            request_builder = request_builder.header("Authorization", format!("Bearer {token}"));
        }

        let body = if let Some(body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(body)
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
