//! Configuration types for sync runs.
//!
//! A run is configured from two explicit sources merged once at startup:
//! command-line flags win over the command's section of the TOML config
//! file, which wins over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Time allowed for a single attachment download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Time budget around thumbnail generation for one attachment.
pub const THUMBNAIL_TIME_BUDGET: Duration = Duration::from_secs(900);

/// Time allowed for the HEAD probe that precedes a download.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default content directory name used by the `<content_dir>/uploads/` infix.
pub const DEFAULT_CONTENT_DIR: &str = "app";

/// Timeouts applied to the blocking steps of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for a full download, body included.
    pub download: Duration,
    /// Budget for the image pipeline.
    pub thumbnail: Duration,
    /// Limit for the HEAD probe.
    pub probe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            download: DOWNLOAD_TIMEOUT,
            thumbnail: THUMBNAIL_TIME_BUDGET,
            probe: PROBE_TIMEOUT,
        }
    }
}

/// The two commands sharing the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `download-attachments run`
    DownloadAttachments,
    /// `media restore`
    MediaRestore,
}

impl Command {
    /// Human-readable invocation of the command.
    #[must_use]
    pub const fn invocation(self) -> &'static str {
        match self {
            Self::DownloadAttachments => "download-attachments run",
            Self::MediaRestore => "media restore",
        }
    }

    /// Config file key that enables thumbnail generation.
    #[must_use]
    pub const fn generate_key(self) -> &'static str {
        match self {
            Self::DownloadAttachments => "download_attachments.generate_thumbs",
            Self::MediaRestore => "media.restore.generate",
        }
    }
}

/// Values given on the command line. `None` means the flag was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFlags {
    /// `--generate_thumbs` / `--generate`.
    pub generate: Option<bool>,
    /// `--uploads_url` / `--uploads-url`.
    pub uploads_url: Option<String>,
}

/// A boolean that may be written as a TOML bool or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigBool {
    /// `generate = true`
    Bool(bool),
    /// `generate = "true"`
    Text(String),
}

impl ConfigBool {
    /// Interprets the value of `key`. Strings must be `true`, `false`, `1`,
    /// `0` or empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for any other string.
    pub fn to_bool(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                other => Err(Error::Config(format!(
                    "{key} must be a boolean, got \"{other}\""
                ))),
            },
        }
    }
}

/// `[download_attachments]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadAttachmentsSection {
    pub generate_thumbs: Option<ConfigBool>,
    pub uploads_url: Option<String>,
}

/// `[media.restore]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSection {
    pub generate: Option<ConfigBool>,
    pub uploads_url: Option<String>,
}

/// `[media]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSection {
    pub restore: Option<RestoreSection>,
}

/// `[site]` section: where the attachment store and local uploads live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSection {
    /// JSON attachment store file.
    pub store: Option<PathBuf>,
    /// Local uploads root.
    pub uploads_dir: Option<PathBuf>,
    /// Content directory name, e.g. `app` for `app/uploads/`.
    pub content_dir: Option<String>,
    /// Program (and leading arguments) that generates image sizes.
    pub thumbnail_command: Option<Vec<String>>,
}

/// Parsed TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub download_attachments: Option<DownloadAttachmentsSection>,
    pub media: Option<MediaSection>,
    #[serde(default)]
    pub site: SiteSection,
}

impl FileConfig {
    /// Default config file location, `<config_dir>/attachment-sync/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("attachment-sync")
            .join("config.toml")
    }

    /// Parses a config file from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Loads the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the `(generate, uploads_url)` pair of the command's section.
    fn command_values(&self, command: Command) -> (Option<&ConfigBool>, Option<String>) {
        match command {
            Command::DownloadAttachments => self
                .download_attachments
                .as_ref()
                .map_or((None, None), |s| (s.generate_thumbs.as_ref(), s.uploads_url.clone())),
            Command::MediaRestore => self
                .media
                .as_ref()
                .and_then(|m| m.restore.as_ref())
                .map_or((None, None), |s| (s.generate.as_ref(), s.uploads_url.clone())),
        }
    }
}

/// Resolved configuration of one run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Remote uploads root, always ending in `/`.
    pub remote_base_url: String,
    /// Whether to regenerate image sizes after a download.
    pub generate_thumbnails: bool,
    /// Step timeouts.
    pub timeouts: Timeouts,
}

impl RunConfig {
    /// Creates a configuration for the given remote uploads root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingUrl`] for an empty URL and
    /// [`Error::InvalidUrl`] when it has no scheme or host.
    pub fn new(remote_base_url: &str) -> Result<Self> {
        let trimmed = remote_base_url.trim();
        if trimmed.is_empty() {
            return Err(Error::MissingUrl);
        }
        let parsed = reqwest::Url::parse(trimmed).map_err(|e| Error::InvalidUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(Error::InvalidUrl {
                url: trimmed.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let remote_base_url = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };

        Ok(Self {
            remote_base_url,
            generate_thumbnails: false,
            timeouts: Timeouts::default(),
        })
    }

    /// Builds the configuration of `command` from flags and the config file.
    ///
    /// Flags override the file section; empty URL strings count as absent.
    pub fn for_command(command: Command, flags: &CommandFlags, file: &FileConfig) -> Result<Self> {
        let (file_generate, file_url) = file.command_values(command);

        let uploads_url = flags
            .uploads_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| file_url.filter(|u| !u.trim().is_empty()))
            .ok_or(Error::MissingUrl)?;

        let generate = match flags.generate {
            Some(generate) => generate,
            None => file_generate
                .map(|value| value.to_bool(command.generate_key()))
                .transpose()?
                .unwrap_or(false),
        };

        Ok(Self::new(&uploads_url)?.with_generate_thumbnails(generate))
    }

    /// Configuration for `download-attachments run`.
    pub fn for_download_attachments(flags: &CommandFlags, file: &FileConfig) -> Result<Self> {
        Self::for_command(Command::DownloadAttachments, flags, file)
    }

    /// Configuration for `media restore`.
    pub fn for_media_restore(flags: &CommandFlags, file: &FileConfig) -> Result<Self> {
        Self::for_command(Command::MediaRestore, flags, file)
    }

    /// Sets whether thumbnails are regenerated.
    #[must_use]
    pub const fn with_generate_thumbnails(mut self, generate: bool) -> Self {
        self.generate_thumbnails = generate;
        self
    }

    /// Replaces the step timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Site layout: where records are stored and where files land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// JSON attachment store file.
    pub store: PathBuf,
    /// Local uploads root.
    pub uploads_dir: PathBuf,
    /// Content directory name for the `<content_dir>/uploads/` infix.
    pub content_dir: String,
    /// External thumbnail generator, if any.
    pub thumbnail_command: Option<Vec<String>>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from("attachments.json"),
            uploads_dir: PathBuf::from("uploads"),
            content_dir: DEFAULT_CONTENT_DIR.to_string(),
            thumbnail_command: None,
        }
    }
}

impl SiteConfig {
    /// Merges the `[site]` section over the defaults, then applies overrides.
    #[must_use]
    pub fn resolve(
        section: &SiteSection,
        store: Option<PathBuf>,
        uploads_dir: Option<PathBuf>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            store: store
                .or_else(|| section.store.clone())
                .unwrap_or(defaults.store),
            uploads_dir: uploads_dir
                .or_else(|| section.uploads_dir.clone())
                .unwrap_or(defaults.uploads_dir),
            content_dir: section
                .content_dir
                .clone()
                .map(|d| d.trim_matches('/').to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or(defaults.content_dir),
            thumbnail_command: section
                .thumbnail_command
                .clone()
                .filter(|cmd| !cmd.is_empty()),
        }
    }
}
