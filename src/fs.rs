//! Local file system seam of the downloader.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;

/// File system operations the existence gate and the downloader rely on.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whether anything, file or directory, is at `path`.
    ///
    /// Unreadable paths count as absent.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Creates `path` and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Deletes a partially written download. A missing file is not an error.
    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;
}

/// [`FileSystem`] on top of `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
