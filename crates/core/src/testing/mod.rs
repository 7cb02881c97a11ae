//! Testing utilities and mock implementations.
//!
//! Mocks for the worker and notification seams let the processors run
//! end-to-end against a temporary directory tree.
//!
//! # Example
//!
//! ```rust,ignore
//! use naiade_core::testing::{fixtures, MockWorkerInvoker, RecordingNotifier};
//!
//! let temp = tempfile::TempDir::new().unwrap();
//! let config = fixtures::test_config(temp.path());
//! let invoker = MockWorkerInvoker::new();
//! let notifier = RecordingNotifier::new();
//! ```

mod mock_worker;
mod recording_notifier;

pub use mock_worker::{MockWorkerInvoker, RecordedInvocation};
pub use recording_notifier::RecordingNotifier;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use base64::Engine as _;

    use crate::config::{
        AuthConfig, Config, DatabaseConfig, FileServerConfig, PhotoConfig, QueuesConfig,
        RuntimeConfig, ServerConfig, ServiceConfig, ServicesConfig, StorageConfig,
        TransferConfig, WorkersConfig,
    };

    /// A configuration rooted entirely under `root`, with authentication
    /// disabled, fast transfer retries and workers disabled.
    pub fn test_config(root: &Path) -> Config {
        Config {
            auth: AuthConfig::none(),
            ticket_auth: AuthConfig::none(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                path: root.join("naiade.db"),
            },
            file_server: FileServerConfig {
                root: root.join("files"),
            },
            runtime: RuntimeConfig::default(),
            services: ServicesConfig {
                gfpgan: ServiceConfig::new(root.join("services").join("gfpgan"), "GFPGAN"),
                rembg: ServiceConfig::new(root.join("services").join("rembg"), "BACKGROUND-REMOVAL"),
            },
            transfer: TransferConfig::default().with_retries(2).with_retry_delay_ms(1),
            photo: PhotoConfig::default(),
            queues: QueuesConfig::default(),
            storage: StorageConfig {
                public_dir: root.join("public"),
                public_base_url: "http://localhost:8080/processed".to_string(),
            },
            workers: WorkersConfig {
                enabled: false,
                ..WorkersConfig::default()
            },
        }
    }

    /// Runtime that runs `script` with `sh` in place of conda.
    ///
    /// The script receives `run -n <env> <python> <entry> <args..>` as its
    /// positional parameters.
    pub fn script_runtime(script: &Path) -> RuntimeConfig {
        RuntimeConfig {
            launcher: PathBuf::from("sh"),
            launcher_args: vec![script.display().to_string()],
            ..RuntimeConfig::default()
        }
    }

    /// Writes a small fake image, creating parent directories.
    pub fn write_image(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"\x89PNG\r\n\x1a\nfake").unwrap();
    }

    /// An inline PNG source.
    pub fn data_uri_png() -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n\x1a\nfake")
        )
    }
}
