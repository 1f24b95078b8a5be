//! Error types for the attachment-sync library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort a sync run.
///
/// Per-attachment problems (dead links, failed transfers, thumbnail
/// failures) never surface here; they are collected as warnings in
/// [`RunResult`](crate::RunResult).
#[derive(Error, Debug)]
pub enum Error {
    /// No uploads URL was given on the command line or in the config file.
    #[error("Missing url")]
    MissingUrl,

    /// The uploads URL could not be parsed.
    #[error("Invalid url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why parsing failed.
        reason: String,
    },

    /// Configuration could not be assembled.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored path would resolve outside the local uploads root.
    #[error("path {path} resolves outside the uploads root")]
    PathEscapesRoot {
        /// The normalized stored path.
        path: String,
    },

    /// The attachment store has no record with this ID.
    #[error("Attachment {0} not found")]
    RecordNotFound(u64),

    /// The attachment store failed.
    #[error("Attachment store error at {path}: {reason}")]
    Store {
        /// Backing file of the store.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML config file is malformed.
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP client construction failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for attachment-sync operations.
pub type Result<T> = std::result::Result<T, Error>;
