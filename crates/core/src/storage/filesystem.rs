use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ResultStore, StorageError, StoredResult};
use crate::config::{StorageConfig, TransferConfig};
use crate::service::ServiceKind;
use crate::transfer::FileTransfer;

/// Stores results under `<public_dir>/<service>/<uuid>.<ext>`, served at
/// `<public_base_url>/<service>/<uuid>.<ext>`.
pub struct FsResultStore {
    public_dir: PathBuf,
    public_base_url: String,
    transfer: FileTransfer,
}

impl FsResultStore {
    pub fn new(config: &StorageConfig, transfer: TransferConfig) -> Self {
        Self {
            public_dir: config.public_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            transfer: FileTransfer::new(transfer),
        }
    }

    fn url_for(&self, relative: &Path) -> String {
        let tail: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, tail.join("/"))
    }
}

#[async_trait]
impl ResultStore for FsResultStore {
    async fn store(&self, service: ServiceKind, file: &Path) -> Result<StoredResult, StorageError> {
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| StorageError::InvalidName(file.to_path_buf()))?
            .to_ascii_lowercase();

        let folder = service.as_str().to_ascii_lowercase();
        let name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        let destination = self.public_dir.join(&folder).join(&name);

        let written = self.transfer.move_or_copy(file, &destination).await?;
        let relative = written
            .strip_prefix(&self.public_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(&folder).join(&name));

        let url = self.url_for(&relative);
        debug!(service = %service, path = %written.display(), url = %url, "Stored result");

        Ok(StoredResult { path: written, url })
    }
}
