pub mod auth;
pub mod config;
pub mod lock;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod queue;
pub mod service;
pub mod source;
pub mod storage;
pub mod task;
pub mod testing;
pub mod transfer;
pub mod worker;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator, RemoteTokenAuthenticator,
};
pub use config::{
    config_path, load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod,
    Config, ConfigError, SanitizedConfig,
};
pub use lock::{lock_key, LockError, SqliteTaskLock, TaskLock, TaskLockGuard};
pub use notify::{Envelope, Notification, NotificationEvent, Notifier, NotifyError};
pub use orchestrator::{
    DispatchReceipt, JobHandler, NaiadeJobHandler, OrchestratorError, PhotoDispatcher,
    PhotoOutcome, PhotoProcessor, PhotoProcessorDeps, QueueScheduler, QueueWorker,
    TaskScheduler, TicketOutcome, TicketProcessor,
};
pub use queue::{JobQueue, PhotoRequest, QueueBalancer, QueueError, QueueEstimate, QueuedJob, SqliteJobQueue};
pub use service::{ServiceKind, UnknownService};
pub use source::{SourceError, SourceFetcher};
pub use storage::{FsResultStore, ResultStore, StorageError, StoredResult};
pub use task::{CreateTaskRequest, SqliteTaskStore, Task, TaskError, TaskFilter, TaskStatus, TaskStore};
pub use transfer::{FileTransfer, TransferError, TransferReport};
pub use worker::{BackgroundColor, CondaWorkerInvoker, WorkerError, WorkerInvoker, WorkerRequest};
