//! attachment-sync - Copy a content site's remote attachments into local storage.
//!
//! The library walks an attachment store, resolves where each file lives on
//! the remote origin and where it belongs under the local uploads root, skips
//! files already on disk, downloads the rest and optionally asks an image
//! pipeline to regenerate thumbnails. Output goes through a [`Reporter`], so
//! the engine is independent of any terminal UI.
//!
//! # Example
//!
//! ```no_run
//! use attachment_sync::{
//!     JsonAttachmentStore, NoImagePipeline, NoReport, ReqwestHttpClient, Resolver, RunConfig,
//!     SyncEngine,
//! };
//!
//! # async fn example() -> attachment_sync::Result<()> {
//! let config = RunConfig::new("https://old.example.com/app/uploads/")?;
//! let resolver = Resolver::new(&config.remote_base_url, "/srv/www/uploads", "app")?;
//! let store = JsonAttachmentStore::open("attachments.json")?;
//!
//! let mut engine = SyncEngine::new(
//!     config,
//!     resolver,
//!     store,
//!     ReqwestHttpClient::new()?,
//!     NoImagePipeline,
//! );
//! let result = engine.run(&NoReport).await?;
//! println!("Downloaded {} attachments", result.downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod format;
pub mod fs;
pub mod http;
pub mod resolve;
pub mod stats;
pub mod store;
pub mod thumbnails;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use config::{Command, CommandFlags, FileConfig, RunConfig, SiteConfig, Timeouts};
pub use download::Downloader;
pub use engine::{NoReport, Reporter, SyncEngine};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration, render_table};
pub use fs::{FileSystem, TokioFileSystem};
pub use http::{FetchOutcome, HttpClient, ReqwestHttpClient};
pub use resolve::{Resolution, Resolver};
pub use stats::{Outcome, RunResult};
pub use store::{AttachmentMetadata, AttachmentRecord, AttachmentStore, JsonAttachmentStore, RecordKind};
pub use thumbnails::{
    CommandImagePipeline, ImagePipeline, NoImagePipeline, PipelineError, ThumbnailOutcome,
};
