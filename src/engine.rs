//! The sync loop shared by both commands.
//!
//! For every attachment, in enumeration order, [`SyncEngine::run`] ticks the
//! progress indicator, resolves the record, skips it if the file is already
//! on disk, probes the origin, downloads the body and finally asks the image
//! pipeline for fresh thumbnails. Per-record problems end up as warnings in
//! the [`RunResult`]; only store faults abort the run.

use std::path::Path;

use crate::config::RunConfig;
use crate::download::Downloader;
use crate::error::Result;
use crate::format::{format_bytes, format_duration};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::http::{FetchOutcome, HttpClient};
use crate::resolve::Resolver;
use crate::stats::{Outcome, RunResult};
use crate::store::{AttachmentRecord, AttachmentStore};
use crate::thumbnails::{ImagePipeline, ThumbnailOutcome, maybe_generate};

/// Headers of the summary table.
pub const SUMMARY_HEADERS: [&str; 2] = ["Item", "Count"];

/// Receives user-facing output of a run.
///
/// All methods have no-op defaults.
pub trait Reporter: Send + Sync {
    /// A plain informational line.
    fn line(&self, _message: &str) {}

    /// A non-fatal problem, emitted after the pass.
    fn warning(&self, _message: &str) {}

    /// A progress indicator over `total` items starts.
    fn progress_start(&self, _label: &str, _total: u64) {}

    /// The progress indicator advances by one.
    fn progress_tick(&self) {}

    /// The progress indicator is done.
    fn progress_finish(&self) {}

    /// A table with a header row.
    fn table(&self, _headers: &[&str], _rows: &[Vec<String>]) {}
}

/// A reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReport;

impl Reporter for NoReport {}

/// Drives one synchronization pass over an attachment store.
pub struct SyncEngine<S, H, P, F = TokioFileSystem>
where
    S: AttachmentStore,
    H: HttpClient,
    P: ImagePipeline,
    F: FileSystem,
{
    config: RunConfig,
    resolver: Resolver,
    store: S,
    downloader: Downloader<H, F>,
    pipeline: P,
}

impl<S, H, P> SyncEngine<S, H, P, TokioFileSystem>
where
    S: AttachmentStore,
    H: HttpClient,
    P: ImagePipeline,
{
    /// Creates an engine on the real file system.
    #[must_use]
    pub fn new(config: RunConfig, resolver: Resolver, store: S, http: H, pipeline: P) -> Self {
        let downloader = Downloader::new(http, config.timeouts);
        Self {
            config,
            resolver,
            store,
            downloader,
            pipeline,
        }
    }
}

impl<S, H, P, F> SyncEngine<S, H, P, F>
where
    S: AttachmentStore,
    H: HttpClient,
    P: ImagePipeline,
    F: FileSystem,
{
    /// Creates an engine with a custom file system implementation.
    #[must_use]
    pub fn with_fs(
        config: RunConfig,
        resolver: Resolver,
        store: S,
        http: H,
        pipeline: P,
        fs: F,
    ) -> Self {
        let downloader = Downloader::with_fs(http, config.timeouts, fs);
        Self {
            config,
            resolver,
            store,
            downloader,
            pipeline,
        }
    }

    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The attachment store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The downloader, for access to its HTTP client.
    #[must_use]
    pub const fn downloader(&self) -> &Downloader<H, F> {
        &self.downloader
    }

    /// Consumes the engine and returns the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Processes every attachment and reports the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first store fault; nothing after the progress bar is
    /// reported in that case.
    pub async fn run(&mut self, reporter: &dyn Reporter) -> Result<RunResult> {
        let ids = self.store.enumerate_attachment_ids()?;
        let mut result = RunResult::new(ids.len());

        reporter.line(&format!(
            "Downloading {} attachments{}",
            ids.len(),
            if self.config.generate_thumbnails {
                " and generating thumbnails."
            } else {
                "."
            }
        ));

        reporter.progress_start("Progress", ids.len() as u64);
        for id in ids {
            reporter.progress_tick();
            if let Err(e) = self.process(id, &mut result).await {
                log::debug!("aborting run at attachment {id}: {e}");
                reporter.progress_finish();
                return Err(e);
            }
        }
        reporter.progress_finish();

        report_summary(&result, reporter);
        Ok(result)
    }

    /// Runs one record through resolve, gate, probe, download and thumbnails.
    async fn process(&mut self, id: u64, result: &mut RunResult) -> Result<()> {
        let record = self.store.get_record(id)?;

        let resolution = match self.resolver.resolve(&record) {
            Ok(resolution) => resolution,
            Err(e) => {
                result.warn(format!("Skipping attachment ID {id}: {e}"));
                return Ok(());
            }
        };

        if let Some(normalized) = &resolution.normalized_stored_path
            && *normalized != record.stored_relative_path
        {
            log::debug!(
                "attachment {id}: stored path {:?} -> {normalized:?}",
                record.stored_relative_path
            );
            self.store.set_stored_path(id, normalized)?;
        }

        if self.downloader.local_exists(&resolution.local_path).await {
            log::debug!("attachment {id}: {} exists", resolution.local_path.display());
            result.record(Outcome::AlreadyExists);
            return Ok(());
        }

        // An empty stored path resolves to the uploads root, which is never
        // written as a file.
        if resolution.local_path == self.resolver.uploads_root() {
            result.warn(format!(
                "Could not download {}, got error: {} is the uploads directory, not a file",
                resolution.remote_url,
                self.resolver.uploads_root().display()
            ));
            result.record(Outcome::Failed);
            return Ok(());
        }

        if resolution.needs_probe() {
            match self.downloader.probe(&resolution.remote_url).await {
                FetchOutcome::Ok(_) => {}
                FetchOutcome::TransportError(msg) => result.warn(format!(
                    "Could not retrieve remote file for attachment ID {id}, HTTP error \"{msg}\""
                )),
                FetchOutcome::HttpError(status) => {
                    result.warn(format!(
                        "Could not retrieve remote file for attachment ID {id}, HTTP response code {status}"
                    ));
                    return Ok(());
                }
            }
        }

        let bytes = match self
            .downloader
            .download(&resolution.remote_url, &resolution.local_path)
            .await
        {
            FetchOutcome::Ok(bytes) => bytes,
            FetchOutcome::TransportError(msg) => {
                result.warn(format!(
                    "Could not download {}, got error: {msg}",
                    resolution.remote_url
                ));
                result.record(Outcome::Failed);
                return Ok(());
            }
            // Counted as neither downloaded nor failed.
            FetchOutcome::HttpError(status) => {
                result.warn(format!(
                    "Could not retrieve remote file for attachment ID {id}, HTTP response code {status}"
                ));
                return Ok(());
            }
        };

        self.regenerate_thumbnails(&record, &resolution.local_path, result)
            .await?;
        result.record(Outcome::Downloaded(bytes));
        Ok(())
    }

    async fn regenerate_thumbnails(
        &mut self,
        record: &AttachmentRecord,
        local_path: &Path,
        result: &mut RunResult,
    ) -> Result<()> {
        let id = record.id;
        match maybe_generate(&self.pipeline, record, local_path, &self.config).await {
            ThumbnailOutcome::Skipped => {}
            ThumbnailOutcome::Generated(metadata) => {
                self.store.set_attachment_metadata(id, metadata)?;
                result.record(Outcome::ThumbnailsGenerated);
            }
            ThumbnailOutcome::Error(msg) => result.warn(format!(
                "Error generating image thumbnails for attachment ID {id}: {msg}"
            )),
            ThumbnailOutcome::EmptyResult => result.warn(format!(
                "Unknown error generating image thumbnails for attachment ID {id}"
            )),
        }
        Ok(())
    }
}

/// Emits the transfer line, the warnings and finally the summary table.
pub fn report_summary(result: &RunResult, reporter: &dyn Reporter) {
    reporter.line(&format!(
        "Transferred {} in {}.",
        format_bytes(result.bytes_downloaded),
        format_duration(result.elapsed())
    ));
    for warning in result.warnings() {
        reporter.warning(warning);
    }
    let rows: Vec<Vec<String>> = result
        .rows()
        .iter()
        .map(|(name, count)| vec![(*name).to_string(), count.to_string()])
        .collect();
    reporter.table(&SUMMARY_HEADERS, &rows);
}
