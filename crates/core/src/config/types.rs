use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::service::ServiceKind;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Credential check for single-photo requests (HTTP and WebSocket).
    pub auth: AuthConfig,
    /// Credential check for the ticket endpoints.
    pub ticket_auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub file_server: FileServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub photo: PhotoConfig,
    #[serde(default)]
    pub queues: QueuesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared secret for `api_key`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Endpoint that answers 2xx for a valid bearer token (`remote` only).
    #[serde(default)]
    pub validate_url: Option<String>,
    /// Token accepted without calling `validate_url`.
    #[serde(default)]
    pub bypass_token: Option<String>,
    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
}

impl AuthConfig {
    pub fn none() -> Self {
        Self {
            method: AuthMethod::None,
            api_key: None,
            validate_url: None,
            bypass_token: None,
            timeout_secs: default_auth_timeout(),
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            method: AuthMethod::ApiKey,
            api_key: Some(key.into()),
            ..Self::none()
        }
    }
}

fn default_auth_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
    Remote,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
            AuthMethod::Remote => "remote",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("naiade.db")
}

/// Shared file server holding one directory per ticket.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(default = "default_file_server_root")]
    pub root: PathBuf,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            root: default_file_server_root(),
        }
    }
}

impl FileServerConfig {
    pub fn ticket_dir(&self, ticket: &str) -> PathBuf {
        self.root.join(ticket)
    }
}

fn default_file_server_root() -> PathBuf {
    PathBuf::from("naiade_files")
}

/// How worker processes are launched.
///
/// The command line is
/// `<launcher> <launcher_args..> run -n <environment> <python> <script> <args..>`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_launcher")]
    pub launcher: PathBuf,
    /// Placed before `run`, for wrapper scripts around the launcher.
    #[serde(default)]
    pub launcher_args: Vec<String>,
    #[serde(default = "default_python")]
    pub python: String,
    /// Entry script for ticket (batch) mode.
    #[serde(default = "default_batch_script")]
    pub batch_script: String,
    /// Entry script for single-photo mode.
    #[serde(default = "default_photo_script")]
    pub photo_script: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            launcher: default_launcher(),
            launcher_args: Vec::new(),
            python: default_python(),
            batch_script: default_batch_script(),
            photo_script: default_photo_script(),
        }
    }
}

fn default_launcher() -> PathBuf {
    PathBuf::from("conda")
}

fn default_python() -> String {
    "python".to_string()
}

fn default_batch_script() -> String {
    "bucle.py".to_string()
}

fn default_photo_script() -> String {
    "script.py".to_string()
}

/// Per-service execution environment and directory root.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub root: PathBuf,
    pub environment: String,
}

impl ServiceConfig {
    pub fn new(root: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            environment: environment.into(),
        }
    }

    /// Input staging directory for a ticket.
    pub fn staging_dir(&self, ticket: &str) -> PathBuf {
        self.root.join("naiade_tmp").join(ticket)
    }

    /// Directory the worker writes a ticket's results to.
    pub fn output_dir(&self, ticket: &str) -> PathBuf {
        self.root.join("naiade_output").join(ticket)
    }

    /// Where single-photo sources are written before invocation.
    pub fn photo_input_dir(&self) -> PathBuf {
        self.root.join("tmp_image")
    }

    /// Where the worker leaves a processed single photo.
    pub fn photo_output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// One entry per [`ServiceKind`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default = "default_gfpgan")]
    pub gfpgan: ServiceConfig,
    #[serde(default = "default_rembg")]
    pub rembg: ServiceConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            gfpgan: default_gfpgan(),
            rembg: default_rembg(),
        }
    }
}

impl ServicesConfig {
    pub fn get(&self, service: ServiceKind) -> &ServiceConfig {
        match service {
            ServiceKind::Gfpgan => &self.gfpgan,
            ServiceKind::Rembg => &self.rembg,
        }
    }
}

fn default_gfpgan() -> ServiceConfig {
    ServiceConfig::new("services/GFPGAN", "GFPGAN")
}

fn default_rembg() -> ServiceConfig {
    ServiceConfig::new("services/REMBG", "BACKGROUND-REMOVAL")
}

/// Retry policy for file moves on network volumes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    /// Attempts per strategy (rename, then copy).
    #[serde(default = "default_io_retries")]
    pub io_retries: u32,
    #[serde(default = "default_io_retry_delay_ms")]
    pub io_retry_delay_ms: u64,
    /// How many `_<n>` collision suffixes are tried, `n` running from 1.
    #[serde(default = "default_max_suffix")]
    pub max_suffix_attempts: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            io_retries: default_io_retries(),
            io_retry_delay_ms: default_io_retry_delay_ms(),
            max_suffix_attempts: default_max_suffix(),
        }
    }
}

impl TransferConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.io_retry_delay_ms)
    }

    /// Sets the retry delay.
    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.io_retry_delay_ms = delay_ms;
        self
    }

    /// Sets the attempt count per strategy.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.io_retries = retries;
        self
    }
}

fn default_io_retries() -> u32 {
    5
}

fn default_io_retry_delay_ms() -> u64 {
    500
}

fn default_max_suffix() -> u32 {
    10_000
}

/// Single-photo mode limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoConfig {
    #[serde(default = "default_max_image_size_mb")]
    pub max_image_size_mb: u64,
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_image_size_mb: default_max_image_size_mb(),
            lock_ttl_secs: default_lock_ttl(),
            worker_timeout_secs: default_worker_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl PhotoConfig {
    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_size_mb * 1024 * 1024
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

fn default_max_image_size_mb() -> u64 {
    10
}

fn default_lock_ttl() -> u64 {
    10
}

fn default_worker_timeout() -> u64 {
    300
}

fn default_download_timeout() -> u64 {
    30
}

/// Named queues.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueuesConfig {
    /// Queue ticket processing is scheduled on.
    #[serde(default = "default_ticket_queue")]
    pub ticket_queue: String,
    /// Candidates for single-photo requests. The first one wins ties.
    #[serde(default = "default_photo_queues")]
    pub photo_queues: Vec<String>,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            ticket_queue: default_ticket_queue(),
            photo_queues: default_photo_queues(),
        }
    }
}

impl QueuesConfig {
    /// Every queue a worker should drain, ticket queue first.
    pub fn all(&self) -> Vec<String> {
        let mut queues = vec![self.ticket_queue.clone()];
        for queue in &self.photo_queues {
            if !queues.contains(queue) {
                queues.push(queue.clone());
            }
        }
        queues
    }
}

fn default_ticket_queue() -> String {
    "naiade".to_string()
}

fn default_photo_queues() -> Vec<String> {
    vec!["python".to_string(), "python2".to_string()]
}

/// Durable storage for processed single photos.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public/processed")
}

fn default_public_base_url() -> String {
    "http://localhost:8080/processed".to_string()
}

/// Queue worker loops.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    1000
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub ticket_auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub file_server: FileServerConfig,
    pub services: ServicesConfig,
    pub transfer: TransferConfig,
    pub photo: PhotoConfig,
    pub queues: QueuesConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_url: Option<String>,
    pub bypass_token_configured: bool,
}

impl From<&AuthConfig> for SanitizedAuthConfig {
    fn from(auth: &AuthConfig) -> Self {
        Self {
            method: auth.method.as_str().to_string(),
            api_key_configured: auth.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            validate_url: auth.validate_url.clone(),
            bypass_token_configured: auth.bypass_token.as_deref().is_some_and(|t| !t.is_empty()),
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig::from(&config.auth),
            ticket_auth: SanitizedAuthConfig::from(&config.ticket_auth),
            server: config.server.clone(),
            database: config.database.clone(),
            file_server: config.file_server.clone(),
            services: config.services.clone(),
            transfer: config.transfer.clone(),
            photo: config.photo.clone(),
            queues: config.queues.clone(),
            workers: config.workers.clone(),
        }
    }
}
