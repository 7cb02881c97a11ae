use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::inline::{extension_from_url, is_inline, parse_inline};
use super::SourceError;
use crate::config::PhotoConfig;

/// A source written to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredSource {
    /// File name inside the target directory.
    pub filename: String,
    pub path: PathBuf,
}

/// Downloads or decodes photo sources into a worker's input directory.
#[derive(Clone)]
pub struct SourceFetcher {
    client: Client,
    max_bytes: u64,
    max_mb: u64,
}

impl SourceFetcher {
    pub fn new(config: &PhotoConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.download_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        Ok(Self::with_client(client, config))
    }

    /// Uses a preconfigured HTTP client.
    pub fn with_client(client: Client, config: &PhotoConfig) -> Self {
        Self {
            client,
            max_bytes: config.max_image_bytes(),
            max_mb: config.max_image_size_mb,
        }
    }

    /// Writes `source` to `<dir>/<uuid>.<ext>`. Nothing is left behind on
    /// failure.
    pub async fn fetch(&self, source: &str, dir: &Path) -> Result<AcquiredSource, SourceError> {
        fs::create_dir_all(dir).await?;

        if is_inline(source) {
            let image = parse_inline(source, self.max_bytes, self.max_mb)?;
            let target = Self::target(dir, &image.extension);
            if let Err(e) = fs::write(&target.path, &image.bytes).await {
                let _ = fs::remove_file(&target.path).await;
                return Err(e.into());
            }
            debug!(path = %target.path.display(), bytes = image.bytes.len(), "Decoded inline image");
            return Ok(target);
        }

        let url = Url::parse(source.trim())
            .map_err(|e| SourceError::InvalidSource(format!("{source}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SourceError::InvalidSource(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        self.check_headers(&url).await?;

        let target = Self::target(dir, &extension_from_url(&url));
        match self.download(&url, &target.path).await {
            Ok(written) => {
                debug!(url = %url, path = %target.path.display(), bytes = written, "Downloaded image");
                Ok(target)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&target.path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %target.path.display(), "Failed to remove partial download: {}", cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    fn target(dir: &Path, extension: &str) -> AcquiredSource {
        let filename = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        AcquiredSource {
            path: dir.join(&filename),
            filename,
        }
    }

    /// Content type must be `image/*` and the declared length must be
    /// present and within the limit.
    async fn check_headers(&self, url: &Url) -> Result<(), SourceError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());
        if !content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
        {
            return Err(SourceError::NotAnImage(content_type));
        }

        let length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or(SourceError::MissingLength)?;
        if length > self.max_bytes {
            return Err(SourceError::TooLarge { max_mb: self.max_mb });
        }

        Ok(())
    }

    /// Streams the body to `path`, bounded by the size limit.
    async fn download(&self, url: &Url, path: &Path) -> Result<u64, SourceError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        let mut file = fs::File::create(path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?
        {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(SourceError::TooLarge { max_mb: self.max_mb });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(SourceError::Empty);
        }
        Ok(written)
    }
}
