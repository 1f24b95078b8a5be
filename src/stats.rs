//! Aggregate outcome of a sync run.

use std::time::{Duration, Instant};

/// A counter-changing event for one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The local file was already present.
    AlreadyExists,
    /// The file was fetched; carries the body size in bytes.
    Downloaded(u64),
    /// The transfer broke off.
    Failed,
    /// Thumbnails were regenerated.
    ThumbnailsGenerated,
}

/// Counters and warnings accumulated over one run.
///
/// Counters only grow and warnings are kept in recording order.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Number of attachments enumerated.
    pub total: usize,
    /// Attachments whose local file already existed.
    pub already_exists: usize,
    /// Attachments fetched successfully.
    pub downloaded: usize,
    /// Attachments whose transfer failed at the transport level.
    pub failed: usize,
    /// Attachments whose thumbnails were regenerated.
    pub thumbnails_generated: usize,
    /// Sum of downloaded body sizes.
    pub bytes_downloaded: u64,
    warnings: Vec<String>,
    start_time: Instant,
}

impl RunResult {
    /// Creates an empty result for a run over `total` attachments.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            already_exists: 0,
            downloaded: 0,
            failed: 0,
            thumbnails_generated: 0,
            bytes_downloaded: 0,
            warnings: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records one outcome.
    pub const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::AlreadyExists => self.already_exists += 1,
            Outcome::Downloaded(bytes) => {
                self.downloaded += 1;
                self.bytes_downloaded += bytes;
            }
            Outcome::Failed => self.failed += 1,
            Outcome::ThumbnailsGenerated => self.thumbnails_generated += 1,
        }
    }

    /// Appends a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("warning: {message}");
        self.warnings.push(message);
    }

    /// Warnings in the order they were recorded.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Summary rows in display order: `attachments, exists, downloaded, failed, generated`.
    #[must_use]
    pub fn rows(&self) -> [(&'static str, usize); 5] {
        [
            ("attachments", self.total),
            ("exists", self.already_exists),
            ("downloaded", self.downloaded),
            ("failed", self.failed),
            ("generated", self.thumbnails_generated),
        ]
    }
}
