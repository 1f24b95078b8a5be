//! Remote probing and streaming downloads of single attachments.

use std::path::Path;

use crate::config::Timeouts;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::http::{FetchOutcome, HttpClient};

/// Fetches attachments from the remote origin onto the local file system.
pub struct Downloader<H: HttpClient, F: FileSystem = TokioFileSystem> {
    http: H,
    timeouts: Timeouts,
    fs: F,
}

impl<H: HttpClient> Downloader<H, TokioFileSystem> {
    /// Creates a new downloader with the default file system.
    #[must_use]
    pub const fn new(http: H, timeouts: Timeouts) -> Self {
        Self {
            http,
            timeouts,
            fs: TokioFileSystem,
        }
    }
}

impl<H: HttpClient, F: FileSystem> Downloader<H, F> {
    /// Creates a new downloader with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(http: H, timeouts: Timeouts, fs: F) -> Self {
        Self { http, timeouts, fs }
    }

    /// Returns a reference to the underlying HTTP client.
    #[must_use]
    pub const fn http(&self) -> &H {
        &self.http
    }

    /// Returns the file system implementation.
    #[must_use]
    pub const fn fs(&self) -> &F {
        &self.fs
    }

    /// Returns the timeouts in use.
    #[must_use]
    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Whether something already exists at `local_path`.
    pub async fn local_exists(&self, local_path: &Path) -> bool {
        self.fs.file_exists(local_path).await
    }

    /// Checks that `remote_url` answers a HEAD request with 200.
    pub async fn probe(&self, remote_url: &str) -> FetchOutcome {
        log::debug!("probing {remote_url}");
        self.http.head(remote_url, self.timeouts.probe).await
    }

    /// Ensures the parent directory exists for a file path.
    async fn ensure_parent_dir(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs.create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Streams `remote_url` into `local_path`.
    ///
    /// A transport error removes whatever partial file was written. A
    /// non-200 status leaves the file system untouched.
    pub async fn download(&self, remote_url: &str, local_path: &Path) -> FetchOutcome {
        if let Err(e) = self.ensure_parent_dir(local_path).await {
            return FetchOutcome::TransportError(format!(
                "could not create directory for {}: {e}",
                local_path.display()
            ));
        }

        log::debug!("downloading {remote_url} to {}", local_path.display());
        let outcome = self
            .http
            .get_to_file(remote_url, local_path, self.timeouts.download)
            .await;

        if matches!(outcome, FetchOutcome::TransportError(_))
            && self.fs.file_exists(local_path).await
            && let Err(e) = self.fs.remove_file(local_path).await
        {
            log::warn!(
                "could not remove partial download {}: {e}",
                local_path.display()
            );
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    /// A mock file system that tracks which paths exist.
    struct MockFileSystem {
        files: Mutex<HashSet<PathBuf>>,
        dirs: Mutex<Vec<PathBuf>>,
        fail_mkdir: bool,
    }

    impl MockFileSystem {
        fn new() -> Self {
            Self {
                files: Mutex::new(HashSet::new()),
                dirs: Mutex::new(Vec::new()),
                fail_mkdir: false,
            }
        }

        fn add_file(&self, path: impl Into<PathBuf>) {
            self.files.lock().unwrap().insert(path.into());
        }

        fn has(&self, path: &str) -> bool {
            self.files.lock().unwrap().contains(Path::new(path))
        }
    }

    #[async_trait::async_trait]
    impl FileSystem for MockFileSystem {
        async fn file_exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains(path)
        }

        async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
            if self.fail_mkdir {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                ));
            }
            self.dirs.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }
    }

    /// An HTTP client that answers every GET with one canned outcome.
    ///
    /// `leaves_partial` simulates a body that broke off after some bytes.
    struct MockHttp {
        get: FetchOutcome,
        head: FetchOutcome,
        leaves_partial: bool,
        written: Mutex<Vec<PathBuf>>,
    }

    impl MockHttp {
        fn new(head: FetchOutcome, get: FetchOutcome) -> Self {
            Self {
                get,
                head,
                leaves_partial: false,
                written: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for MockHttp {
        async fn head(&self, _url: &str, timeout: Duration) -> FetchOutcome {
            assert_eq!(timeout, crate::config::PROBE_TIMEOUT);
            self.head.clone()
        }

        async fn get_to_file(&self, _url: &str, dest: &Path, timeout: Duration) -> FetchOutcome {
            assert_eq!(timeout, crate::config::DOWNLOAD_TIMEOUT);
            if self.get.is_ok() || self.leaves_partial {
                self.written.lock().unwrap().push(dest.to_path_buf());
            }
            self.get.clone()
        }
    }

    async fn download_with(
        http: MockHttp,
        fs: MockFileSystem,
        path: &str,
    ) -> (FetchOutcome, Downloader<MockHttp, MockFileSystem>) {
        // The mock client never touches the mock file system, so register
        // the file it would have written up front.
        if http.get.is_ok() || http.leaves_partial {
            fs.add_file(path);
        }
        let dl = Downloader::with_fs(http, Timeouts::default(), fs);
        let outcome = dl.download("https://old.example.com/a.jpg", Path::new(path)).await;
        (outcome, dl)
    }

    #[tokio::test]
    async fn success_creates_parent_dir() {
        let http = MockHttp::new(FetchOutcome::Ok(0), FetchOutcome::Ok(42));
        let (outcome, dl) = download_with(http, MockFileSystem::new(), "/up/2024/01/a.jpg").await;

        assert_eq!(outcome, FetchOutcome::Ok(42));
        assert_eq!(
            dl.fs.dirs.lock().unwrap().as_slice(),
            &[PathBuf::from("/up/2024/01")]
        );
        assert!(dl.fs.has("/up/2024/01/a.jpg"));
    }

    #[tokio::test]
    async fn transport_error_removes_partial_file() {
        let mut http = MockHttp::new(
            FetchOutcome::Ok(0),
            FetchOutcome::TransportError("connection reset".into()),
        );
        http.leaves_partial = true;
        let (outcome, dl) = download_with(http, MockFileSystem::new(), "/up/a.jpg").await;

        assert!(matches!(outcome, FetchOutcome::TransportError(_)));
        assert_eq!(dl.http.written.lock().unwrap().len(), 1);
        assert!(!dl.fs.has("/up/a.jpg"));
    }

    #[tokio::test]
    async fn http_error_keeps_existing_file() {
        let fs = MockFileSystem::new();
        fs.add_file("/up/a.jpg");
        let http = MockHttp::new(FetchOutcome::Ok(0), FetchOutcome::HttpError(404));
        let (outcome, dl) = download_with(http, fs, "/up/a.jpg").await;

        assert_eq!(outcome, FetchOutcome::HttpError(404));
        assert!(dl.fs.has("/up/a.jpg"));
    }

    #[tokio::test]
    async fn mkdir_failure_is_transport_error() {
        let mut fs = MockFileSystem::new();
        fs.fail_mkdir = true;
        let http = MockHttp::new(FetchOutcome::Ok(0), FetchOutcome::Ok(1));
        let dl = Downloader::with_fs(http, Timeouts::default(), fs);

        let outcome = dl.download("https://x.com/a.jpg", Path::new("/ro/a.jpg")).await;
        match outcome {
            FetchOutcome::TransportError(msg) => assert!(msg.contains("read-only")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(dl.http.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn probe_uses_probe_timeout() {
        let http = MockHttp::new(FetchOutcome::HttpError(500), FetchOutcome::Ok(1));
        let dl = Downloader::with_fs(http, Timeouts::default(), MockFileSystem::new());
        assert_eq!(
            dl.probe("https://x.com/a.jpg").await,
            FetchOutcome::HttpError(500)
        );
    }

    #[tokio::test]
    async fn local_exists_delegates_to_fs() {
        let fs = MockFileSystem::new();
        fs.add_file("/up/a.jpg");
        let http = MockHttp::new(FetchOutcome::Ok(0), FetchOutcome::Ok(0));
        let dl = Downloader::with_fs(http, Timeouts::default(), fs);
        assert!(dl.local_exists(Path::new("/up/a.jpg")).await);
        assert!(!dl.local_exists(Path::new("/up/b.jpg")).await);
    }
}
