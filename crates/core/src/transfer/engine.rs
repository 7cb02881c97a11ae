//! Retrying file mover.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use super::error::TransferError;
use crate::config::TransferConfig;
use crate::metrics::{TRANSFER_FAILURES, TRANSFER_FALLBACKS};

/// Image extensions recognized in ticket directories, matched case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Whether a path carries a recognized image extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Outcome of a directory-scoped move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Final destination of every file that moved.
    pub moved: Vec<PathBuf>,
    /// Sources that could not be moved.
    pub failed: Vec<PathBuf>,
}

impl TransferReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

type RenameFn = fn(&Path, &Path) -> io::Result<()>;
type RemoveFn = fn(&Path) -> io::Result<()>;

/// Moves files with collision avoidance, retries and a copy fallback.
#[derive(Clone)]
pub struct FileTransfer {
    config: TransferConfig,
    rename: RenameFn,
    remove_source: RemoveFn,
}

impl fmt::Debug for FileTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransfer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FileTransfer {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            rename: os_rename,
            remove_source: os_remove_file,
        }
    }

    #[cfg(test)]
    fn with_fs_ops(mut self, rename: RenameFn, remove_source: RemoveFn) -> Self {
        self.rename = rename;
        self.remove_source = remove_source;
        self
    }

    pub fn with_defaults() -> Self {
        Self::new(TransferConfig::default())
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Moves `source` to `destination`, or to a suffixed sibling of it when
    /// `destination` is taken. Returns the path actually written.
    pub async fn move_or_copy(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<PathBuf, TransferError> {
        if !path_exists(source).await {
            return Err(TransferError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let destination = self.unique_destination(destination).await?;
        let attempts = self.config.io_retries.max(1);

        let mut last_error = None;
        for attempt in 1..=attempts {
            let (from, to, rename) = (source.to_path_buf(), destination.clone(), self.rename);
            match blocking(move || rename(&from, &to)).await {
                Ok(()) => return Ok(destination),
                Err(e) => {
                    debug!(
                        source = %source.display(),
                        destination = %destination.display(),
                        attempt,
                        "Rename failed: {}",
                        e
                    );
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        TRANSFER_FALLBACKS.inc();
        for attempt in 1..=attempts {
            match fs::copy(source, &destination).await {
                Ok(_) => {
                    let (from, remove) = (source.to_path_buf(), self.remove_source);
                    if let Err(e) = blocking(move || remove(&from)).await {
                        warn!(
                            source = %source.display(),
                            destination = %destination.display(),
                            "Copied but could not remove source: {}",
                            e
                        );
                    }
                    return Ok(destination);
                }
                Err(e) => {
                    debug!(
                        source = %source.display(),
                        destination = %destination.display(),
                        attempt,
                        "Copy failed: {}",
                        e
                    );
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        TRANSFER_FAILURES.inc();
        Err(TransferError::Exhausted {
            from: source.to_path_buf(),
            to: destination,
            attempts,
            error: last_error
                .unwrap_or_else(|| io::Error::other("no attempt was made")),
        })
    }

    /// Returns `destination` if free, otherwise the first free
    /// `<stem>_<n>.<ext>` sibling with `n` starting at 1.
    pub async fn unique_destination(&self, destination: &Path) -> Result<PathBuf, TransferError> {
        if !path_exists(destination).await {
            return Ok(destination.to_path_buf());
        }

        let parent = destination.parent().unwrap_or_else(|| Path::new(""));
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = destination
            .extension()
            .map(|e| e.to_string_lossy().into_owned());

        for n in 1..=self.config.max_suffix_attempts {
            let name = match &extension {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            };
            let candidate = parent.join(name);
            if !path_exists(&candidate).await {
                return Ok(candidate);
            }
        }

        Err(TransferError::NoUniqueName {
            path: destination.to_path_buf(),
            attempts: self.config.max_suffix_attempts,
        })
    }

    /// Regular files directly inside `dir` with an image extension, sorted.
    pub async fn list_images(&self, dir: &Path) -> Result<Vec<PathBuf>, TransferError> {
        let mut images: Vec<PathBuf> = list_files(dir)
            .await?
            .into_iter()
            .filter(|p| is_image(p))
            .collect();
        images.sort();
        Ok(images)
    }

    /// Moves every image of `dir` into `dest_dir`, continuing past failures.
    pub async fn move_images(
        &self,
        dir: &Path,
        dest_dir: &Path,
    ) -> Result<TransferReport, TransferError> {
        let files = self.list_images(dir).await?;
        self.move_files(files, dest_dir).await
    }

    /// Moves every regular file of `dir` into `dest_dir`, continuing past failures.
    pub async fn move_all(
        &self,
        dir: &Path,
        dest_dir: &Path,
    ) -> Result<TransferReport, TransferError> {
        let mut files = list_files(dir).await?;
        files.sort();
        self.move_files(files, dest_dir).await
    }

    async fn move_files(
        &self,
        files: Vec<PathBuf>,
        dest_dir: &Path,
    ) -> Result<TransferReport, TransferError> {
        fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| TransferError::DirectoryCreationFailed {
                path: dest_dir.to_path_buf(),
                source: e,
            })?;

        let mut report = TransferReport::default();
        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            match self.move_or_copy(&file, &dest_dir.join(name)).await {
                Ok(destination) => report.moved.push(destination),
                Err(e) => {
                    warn!(file = %file.display(), "Failed to move file: {}", e);
                    report.failed.push(file);
                }
            }
        }
        Ok(report)
    }

    /// Removes a directory tree. A missing path is not an error.
    pub async fn remove_dir_all(&self, dir: &Path) -> Result<(), TransferError> {
        match fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransferError::RemoveFailed {
                path: dir.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Removes a single file. A missing path is not an error.
    pub async fn remove_file(&self, path: &Path) -> Result<(), TransferError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransferError::RemoveFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

fn os_rename(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::rename(from, to)
}

fn os_remove_file(path: &Path) -> io::Result<()> {
    std::fs::remove_file(path)
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}

async fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, TransferError> {
    let read_err = |e| TransferError::ReadDirFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = fs::read_dir(dir).await.map_err(read_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => debug!(path = %entry.path().display(), "Skipping entry: {}", e),
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_transfer() -> FileTransfer {
        FileTransfer::new(
            TransferConfig::default()
                .with_retries(2)
                .with_retry_delay_ms(1),
        )
    }

    async fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(path, contents).await.unwrap();
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("a.jpg")));
        assert!(is_image(Path::new("a.JPG")));
        assert!(is_image(Path::new("a.Jpeg")));
        assert!(is_image(Path::new("a.PNG")));
        assert!(!is_image(Path::new("a.gif")));
        assert!(!is_image(Path::new("jpg")));
        assert!(!is_image(Path::new("notes.txt")));
    }

    #[tokio::test]
    async fn test_move_to_free_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("in/a.jpg");
        write(&src, "data").await;

        let dest = temp.path().join("out/nested/a.jpg");
        let moved = fast_transfer().move_or_copy(&src, &dest).await.unwrap();

        assert_eq!(moved, dest);
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_collisions_never_overwrite() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out/a.jpg");
        write(&dest, "original").await;

        let transfer = fast_transfer();
        let mut results = Vec::new();
        for i in 0..3 {
            let src = temp.path().join(format!("in{i}/a.jpg"));
            write(&src, &format!("copy {i}")).await;
            results.push(transfer.move_or_copy(&src, &dest).await.unwrap());
        }

        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "original");
        assert_eq!(results[0], temp.path().join("out/a_1.jpg"));
        assert_eq!(results[1], temp.path().join("out/a_2.jpg"));
        assert_eq!(results[2], temp.path().join("out/a_3.jpg"));
        assert_eq!(fs::read_to_string(&results[2]).await.unwrap(), "copy 2");
    }

    #[tokio::test]
    async fn test_unique_destination_without_extension() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("README");
        write(&dest, "x").await;

        let unique = fast_transfer().unique_destination(&dest).await.unwrap();
        assert_eq!(unique, temp.path().join("README_1"));
    }

    #[tokio::test]
    async fn test_unique_destination_exhausted() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.png");
        write(&dest, "x").await;
        write(&temp.path().join("a_1.png"), "x").await;
        write(&temp.path().join("a_2.png"), "x").await;

        let transfer = FileTransfer::new(TransferConfig {
            max_suffix_attempts: 3,
            ..TransferConfig::default()
        });
        // The last allowed suffix is still tried.
        assert_eq!(
            transfer.unique_destination(&dest).await.unwrap(),
            temp.path().join("a_3.png")
        );

        write(&temp.path().join("a_3.png"), "x").await;
        let result = transfer.unique_destination(&dest).await;
        assert!(matches!(
            result,
            Err(TransferError::NoUniqueName { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_source_fails_fast() {
        let temp = TempDir::new().unwrap();
        let result = fast_transfer()
            .move_or_copy(&temp.path().join("nope.jpg"), &temp.path().join("out.jpg"))
            .await;
        assert!(matches!(result, Err(TransferError::SourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_unusable_destination_keeps_source() {
        // Parent of the destination is a regular file.
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.jpg");
        write(&src, "data").await;
        let blocker = temp.path().join("blocker");
        write(&blocker, "file").await;

        let result = fast_transfer()
            .move_or_copy(&src, &blocker.join("a.jpg"))
            .await;

        assert!(result.is_err());
        assert!(src.exists());
    }

    fn refuse_rename(_: &Path, _: &Path) -> io::Result<()> {
        Err(io::Error::other("Invalid cross-device link"))
    }

    fn refuse_remove(_: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    #[tokio::test]
    async fn test_failed_rename_falls_back_to_copy() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("in/a.jpg");
        write(&src, "data").await;
        let dest = temp.path().join("out/a.jpg");

        let transfer = fast_transfer().with_fs_ops(refuse_rename, os_remove_file);
        let moved = transfer.move_or_copy(&src, &dest).await.unwrap();

        assert_eq!(moved, dest);
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "data");
        assert!(!src.exists());
    }

    #[tokio::test]
    async fn test_copy_succeeds_when_source_cannot_be_removed() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("in/a.jpg");
        write(&src, "data").await;
        let dest = temp.path().join("out/a.jpg");

        let transfer = fast_transfer().with_fs_ops(refuse_rename, refuse_remove);
        let moved = transfer.move_or_copy(&src, &dest).await.unwrap();

        assert_eq!(moved, dest);
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "data");
        assert_eq!(fs::read_to_string(&src).await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_list_images_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("b.PNG"), "x").await;
        write(&temp.path().join("a.jpg"), "x").await;
        write(&temp.path().join("c.JPEG"), "x").await;
        write(&temp.path().join("notes.txt"), "x").await;
        fs::create_dir_all(temp.path().join("sub.jpg")).await.unwrap();

        let images = fast_transfer().list_images(temp.path()).await.unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.JPEG"]);
    }

    #[tokio::test]
    async fn test_list_images_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = fast_transfer().list_images(&temp.path().join("missing")).await;
        assert!(matches!(result, Err(TransferError::ReadDirFailed { .. })));
    }

    #[tokio::test]
    async fn test_move_images_leaves_other_files() {
        let temp = TempDir::new().unwrap();
        let src_dir = temp.path().join("ticket");
        write(&src_dir.join("a.jpg"), "a").await;
        write(&src_dir.join("b.png"), "b").await;
        write(&src_dir.join("info.txt"), "i").await;
        let dest_dir = temp.path().join("staging");

        let report = fast_transfer().move_images(&src_dir, &dest_dir).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.moved.len(), 2);
        assert!(dest_dir.join("a.jpg").exists());
        assert!(dest_dir.join("b.png").exists());
        assert!(src_dir.join("info.txt").exists());
    }

    #[tokio::test]
    async fn test_move_all_moves_everything() {
        let temp = TempDir::new().unwrap();
        let src_dir = temp.path().join("ticket");
        write(&src_dir.join("a.jpg"), "a").await;
        write(&src_dir.join("info.txt"), "i").await;
        let dest_dir = temp.path().join("failed");

        let report = fast_transfer().move_all(&src_dir, &dest_dir).await.unwrap();

        assert_eq!(report.moved.len(), 2);
        assert!(dest_dir.join("info.txt").exists());
        assert!(fs::read_dir(&src_dir).await.unwrap().next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_dir_all_populated_and_missing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tree");
        write(&dir.join("a.jpg"), "a").await;
        write(&dir.join("nested/deeper/b.png"), "b").await;

        let transfer = fast_transfer();
        transfer.remove_dir_all(&dir).await.unwrap();
        assert!(!dir.exists());

        // Second call is a no-op.
        transfer.remove_dir_all(&dir).await.unwrap();
        transfer
            .remove_dir_all(&temp.path().join("never-existed"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_file_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        tokio_test::assert_ok!(fast_transfer().remove_file(&temp.path().join("gone.png")).await);
    }
}
