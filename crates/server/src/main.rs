use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use naiade_core::{
    config_path, create_authenticator, load_config, validate_config, Authenticator,
    CondaWorkerInvoker, FileTransfer, FsResultStore, JobQueue, NaiadeJobHandler, PhotoDispatcher,
    PhotoProcessor, PhotoProcessorDeps, QueueScheduler, QueueWorker, SourceFetcher,
    SqliteJobQueue, SqliteTaskLock, SqliteTaskStore, TaskScheduler, TaskStore, TicketProcessor,
};

use naiade_server::api::{create_router, WsBroadcaster};
use naiade_server::state::{AppServices, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capacity of the WebSocket notification channel
const BROADCAST_CAPACITY: usize = 256;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("NAIADE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run() -> Result<()> {
    init_logging();

    let config_path = config_path();

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));

    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Photo auth method: {:?}", config.auth.method);
    info!("Ticket auth method: {:?}", config.ticket_auth.method);
    info!("Database path: {:?}", config.database.path);

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
    }
    std::fs::create_dir_all(&config.storage.public_dir).with_context(|| {
        format!(
            "Failed to create public directory {:?}",
            config.storage.public_dir
        )
    })?;

    let photo_auth: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create photo authenticator")?,
    );
    let ticket_auth: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.ticket_auth)
            .context("Failed to create ticket authenticator")?,
    );
    info!(
        photo = photo_auth.method_name(),
        ticket = ticket_auth.method_name(),
        "Authenticators ready"
    );

    let tasks = Arc::new(
        SqliteTaskStore::new(&config.database.path).context("Failed to create task store")?,
    );
    let queue = Arc::new(
        SqliteJobQueue::new(&config.database.path).context("Failed to create job queue")?,
    );
    let lock = Arc::new(
        SqliteTaskLock::new(&config.database.path).context("Failed to create task lock")?,
    );

    let invoker = Arc::new(CondaWorkerInvoker::new(
        config.runtime.clone(),
        config.services.clone(),
        config.photo.worker_timeout(),
    ));
    info!(
        launcher = %config.runtime.launcher.display(),
        "Worker invoker ready"
    );

    let broadcaster = WsBroadcaster::new(BROADCAST_CAPACITY);

    let tickets = Arc::new(TicketProcessor::new(
        tasks.clone(),
        invoker.clone(),
        FileTransfer::new(config.transfer.clone()),
        config.file_server.clone(),
        config.services.clone(),
    ));
    let photos = Arc::new(PhotoProcessor::new(
        PhotoProcessorDeps {
            invoker,
            lock,
            fetcher: SourceFetcher::new(&config.photo).context("Failed to create image fetcher")?,
            results: Arc::new(FsResultStore::new(&config.storage, config.transfer.clone())),
            notifier: Arc::new(broadcaster.clone()),
            transfer: FileTransfer::new(config.transfer.clone()),
        },
        config.services.clone(),
        config.photo.lock_ttl(),
    ));

    let worker = QueueWorker::new(
        queue.clone(),
        Arc::new(NaiadeJobHandler::new(tickets, photos)),
        config.queues.all(),
        Duration::from_millis(config.workers.poll_interval_ms),
    );
    if config.workers.enabled {
        worker.start();
        info!(queues = ?config.queues.all(), "Queue workers started");
    } else {
        info!("Queue workers disabled; jobs will wait for an external consumer");
    }

    let scheduler: Arc<dyn TaskScheduler> = Arc::new(QueueScheduler::new(
        queue.clone(),
        config.queues.ticket_queue.clone(),
    ));
    let dispatcher = Arc::new(PhotoDispatcher::new(
        queue.clone(),
        config.queues.photo_queues.clone(),
    ));

    let addr = SocketAddr::new(config.server.host, config.server.port);

    let state = Arc::new(AppState::new(
        config,
        AppServices {
            photo_auth,
            ticket_auth,
            tasks: tasks as Arc<dyn TaskStore>,
            queue: queue as Arc<dyn JobQueue>,
            scheduler,
            dispatcher,
            broadcaster,
        },
    ));

    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down queue workers");
    worker.stop().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
