//! Attachment records and the store that owns them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Image-size metadata of an attachment, as produced by the image pipeline.
pub type AttachmentMetadata = Map<String, Value>;

/// Content type of a record. Only attachments are synced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordKind {
    #[default]
    Attachment,
    Other(String),
}

impl From<String> for RecordKind {
    fn from(s: String) -> Self {
        if s == "attachment" {
            Self::Attachment
        } else {
            Self::Other(s)
        }
    }
}

impl From<RecordKind> for String {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Attachment => "attachment".to_string(),
            RecordKind::Other(s) => s,
        }
    }
}

/// One media item known to the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: u64,
    /// Path relative to the uploads root. Empty when unknown.
    #[serde(default)]
    pub stored_relative_path: String,
    /// Full URL historically associated with the record.
    #[serde(default)]
    pub canonical_url: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, rename = "post_type")]
    pub kind: RecordKind,
    #[serde(default = "epoch")]
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AttachmentMetadata>,
}

const fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl AttachmentRecord {
    /// Creates an attachment record with no metadata, created at the epoch.
    #[must_use]
    pub fn new(
        id: u64,
        stored_relative_path: impl Into<String>,
        canonical_url: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            stored_relative_path: stored_relative_path.into(),
            canonical_url: canonical_url.into(),
            mime_type: mime_type.into(),
            kind: RecordKind::Attachment,
            created: epoch(),
            metadata: None,
        }
    }

    /// Sets the creation date.
    #[must_use]
    pub const fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Sets the record kind.
    #[must_use]
    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    /// Whether the MIME type names an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Whether the record is an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == RecordKind::Attachment
    }
}

/// Read and update access to attachment records.
pub trait AttachmentStore: Send {
    /// IDs of all attachments, newest first.
    fn enumerate_attachment_ids(&self) -> Result<Vec<u64>>;

    /// Full record for `id`.
    fn get_record(&self, id: u64) -> Result<AttachmentRecord>;

    /// Stored relative path of `id`.
    fn get_stored_path(&self, id: u64) -> Result<String> {
        Ok(self.get_record(id)?.stored_relative_path)
    }

    /// Replaces the stored relative path of `id`.
    fn set_stored_path(&mut self, id: u64, path: &str) -> Result<()>;

    /// Image-size metadata of `id`, if any.
    fn get_attachment_metadata(&self, id: u64) -> Result<Option<AttachmentMetadata>> {
        Ok(self.get_record(id)?.metadata)
    }

    /// Replaces the image-size metadata of `id`.
    fn set_attachment_metadata(&mut self, id: u64, metadata: AttachmentMetadata) -> Result<()>;
}

/// Attachment store kept in a JSON array, written through on every change.
///
/// Without a backing file the store lives only in memory.
#[derive(Debug, Clone, Default)]
pub struct JsonAttachmentStore {
    path: Option<PathBuf>,
    records: Vec<AttachmentRecord>,
}

impl JsonAttachmentStore {
    /// Opens the store file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| Error::Store {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let records = serde_json::from_str(&contents).map_err(|e| Error::Store {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: Some(path),
            records,
        })
    }

    /// Creates an in-memory store.
    #[must_use]
    pub const fn in_memory(records: Vec<AttachmentRecord>) -> Self {
        Self {
            path: None,
            records,
        }
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All records in file order.
    #[must_use]
    pub fn records(&self) -> &[AttachmentRecord] {
        &self.records
    }

    fn record_mut(&mut self, id: u64) -> Result<&mut AttachmentRecord> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::RecordNotFound(id))
    }

    /// Writes the records back to disk atomically (write tmp + rename).
    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let store_err = |reason: String| Error::Store {
            path: path.clone(),
            reason,
        };

        let json = serde_json::to_string_pretty(&self.records)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| store_err(e.to_string()))?;
        std::fs::rename(&tmp_path, path).map_err(|e| store_err(e.to_string()))?;
        Ok(())
    }
}

impl AttachmentStore for JsonAttachmentStore {
    fn enumerate_attachment_ids(&self) -> Result<Vec<u64>> {
        let mut attachments: Vec<_> = self.records.iter().filter(|r| r.is_attachment()).collect();
        attachments.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(attachments.into_iter().map(|r| r.id).collect())
    }

    fn get_record(&self, id: u64) -> Result<AttachmentRecord> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(Error::RecordNotFound(id))
    }

    fn set_stored_path(&mut self, id: u64, path: &str) -> Result<()> {
        self.record_mut(id)?.stored_relative_path = path.to_string();
        self.save()
    }

    fn set_attachment_metadata(&mut self, id: u64, metadata: AttachmentMetadata) -> Result<()> {
        self.record_mut(id)?.metadata = Some(metadata);
        self.save()
    }
}
