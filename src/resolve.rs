//! Remote URL and local path resolution for attachment records.

use std::path::{Component, Path, PathBuf};

use reqwest::Url;

use crate::error::{Error, Result};
use crate::store::AttachmentRecord;

/// Where one attachment comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Absolute URL to fetch.
    pub remote_url: String,
    /// Absolute (or uploads-root relative) destination on disk.
    pub local_path: PathBuf,
    /// Corrected stored path, present when the record had one.
    pub normalized_stored_path: Option<String>,
}

impl Resolution {
    /// Whether the record carried a stored path and must be probed first.
    #[must_use]
    pub const fn needs_probe(&self) -> bool {
        self.normalized_stored_path.is_some()
    }
}

/// Resolves records against one remote base URL and one local uploads root.
#[derive(Debug, Clone)]
pub struct Resolver {
    base_url: String,
    domain: String,
    uploads_root: PathBuf,
    content_infix: String,
}

impl Resolver {
    /// Creates a resolver. `base_url` must be absolute; `content_dir` names
    /// the directory whose `<content_dir>/uploads/` infix is dropped from
    /// stored paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `base_url` has no scheme or host.
    pub fn new(base_url: &str, uploads_root: impl Into<PathBuf>, content_dir: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.to_string(),
            domain: remote_domain(base_url)?,
            uploads_root: uploads_root.into(),
            content_infix: format!("{}/uploads/", content_dir.trim_matches('/')),
        })
    }

    /// Scheme, host and explicit port of the base URL, e.g. `https://example.com`.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The local uploads root.
    #[must_use]
    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    /// Computes the remote URL and local path of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathEscapesRoot`] when the normalized stored path
    /// climbs out of the uploads root.
    pub fn resolve(&self, record: &AttachmentRecord) -> Result<Resolution> {
        let stored = record.stored_relative_path.as_str();

        if stored.is_empty() {
            return Ok(Resolution {
                remote_url: self.base_url.clone(),
                local_path: self.uploads_root.clone(),
                normalized_stored_path: None,
            });
        }

        let remote_url = format!("{}{}", self.domain, canonical_path(&record.canonical_url));
        let normalized = self.normalize_stored_path(stored);
        ensure_within_root(&normalized)?;

        Ok(Resolution {
            remote_url,
            local_path: self.uploads_root.join(&normalized),
            normalized_stored_path: Some(normalized),
        })
    }

    /// Strips the remote prefix and the content-dir infix from a stored path.
    ///
    /// The `<content_dir>/uploads/` infix is removed from the stored path,
    /// together with everything before it, and never from the uploads root.
    /// The result is therefore always relative to the root, e.g.
    /// `site/app/uploads/2024/cat.jpg` becomes `2024/cat.jpg`.
    #[must_use]
    pub fn normalize_stored_path(&self, stored: &str) -> String {
        let domain_uploads = format!("{}/uploads", self.domain);

        let stripped = if stored.contains(&domain_uploads) {
            stored.replacen(&domain_uploads, "", 1)
        } else {
            stored
                .strip_prefix(self.base_url.as_str())
                .unwrap_or(stored)
                .to_string()
        };
        let relative = stripped.trim_start_matches('/');

        let relative = match relative.find(&self.content_infix) {
            Some(idx) if idx == 0 || relative[..idx].ends_with('/') => {
                &relative[idx + self.content_infix.len()..]
            }
            _ => relative,
        };

        relative.to_string()
    }
}

/// Returns `scheme://host[:port]` of an absolute URL.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the URL cannot be parsed or has no host.
pub fn remote_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        })?;

    Ok(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

/// Path component of a canonical URL; empty when there is none.
///
/// Host-relative values such as `/app/uploads/a.jpg` are accepted as-is.
#[must_use]
pub fn canonical_path(canonical_url: &str) -> String {
    let path = match Url::parse(canonical_url) {
        Ok(url) if url.cannot_be_a_base() => String::new(),
        Ok(url) => url.path().to_string(),
        Err(_) if canonical_url.starts_with('/') => canonical_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
        Err(_) => String::new(),
    };

    if path == "/" { String::new() } else { path }
}

fn ensure_within_root(relative: &str) -> Result<()> {
    let escapes = Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(Error::PathEscapesRoot {
            path: relative.to_string(),
        });
    }
    Ok(())
}
