//! # Metadata Index Module
//!
//! In-memory and on-disk representation of every media file discovered by a
//! scan.
//!
//! ## Persistence strategy:
//! - One JSON file at the archive root (`metadata.json` by default)
//! - Each run rebuilds the index from scratch and overwrites the file
//!   entirely; there is no merge with the previous run
//! - The file is written to a temporary sibling first and renamed into place,
//!   so readers never observe a half-written index
//!
//! ## Example metadata file:
//! ```json
//! {
//!   "2023/a.jpg": {
//!     "original_path": "/photos/2023/a.jpg",
//!     "filename": "a.jpg",
//!     "filetype": "image/jpeg",
//!     "modified": 1642680000.25,
//!     "created": 1642680000.25,
//!     "size": 1048576
//!   }
//! }
//! ```

use crate::classifier::MediaKind;
use crate::error::ArchiveError;
use crate::utils::archive_temp_file;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fs::Metadata;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// One discovered media file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub relative_path: PathBuf,
    pub filename: String,
    pub media_kind: MediaKind,
    pub mime_type: String,
    pub size_bytes: u64,
    pub modified_at: f64,
    pub created_at: f64,
    pub source_absolute_path: PathBuf,
}

impl MediaRecord {
    /// Build a record from the filesystem attributes of a file
    pub fn from_metadata(
        relative_path: PathBuf,
        source_absolute_path: PathBuf,
        media_kind: MediaKind,
        mime_type: String,
        metadata: &Metadata,
    ) -> Result<Self, ArchiveError> {
        let filename = relative_path
            .file_name()
            .ok_or_else(|| ArchiveError::InvalidPath(relative_path.clone()))?
            .to_string_lossy()
            .into_owned();

        let modified_at = epoch_seconds(metadata.modified()?);
        // Not every filesystem records a birth time
        let created_at = metadata.created().map(epoch_seconds).unwrap_or(modified_at);

        Ok(Self {
            relative_path,
            filename,
            media_kind,
            mime_type,
            size_bytes: metadata.len(),
            modified_at,
            created_at,
            source_absolute_path,
        })
    }

    /// Key of this record inside the index.
    ///
    /// Lossy for names that are not valid UTF-8, two such names can share a key.
    pub fn key(&self) -> String {
        self.relative_path.to_string_lossy().into_owned()
    }

    fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            original_path: self.source_absolute_path.to_string_lossy().into_owned(),
            filename: self.filename.clone(),
            filetype: self.mime_type.clone(),
            modified: self.modified_at,
            created: self.created_at,
            size: self.size_bytes,
        }
    }

    fn from_stored(key: &str, stored: StoredRecord) -> Result<Self, ArchiveError> {
        let media_kind = MediaKind::from_mime(&stored.filetype).ok_or_else(|| {
            ArchiveError::Metadata(format!("{}: unsupported filetype {}", key, stored.filetype))
        })?;

        Ok(Self {
            relative_path: PathBuf::from(key),
            filename: stored.filename,
            media_kind,
            mime_type: stored.filetype,
            size_bytes: stored.size,
            modified_at: stored.modified,
            created_at: stored.created,
            source_absolute_path: PathBuf::from(stored.original_path),
        })
    }
}

fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

/// On-disk shape of a record
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    original_path: String,
    filename: String,
    filetype: String,
    modified: f64,
    created: f64,
    size: u64,
}

/// All records of one run, keyed by relative path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataIndex {
    records: BTreeMap<String, MediaRecord>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a second record with the same relative path is rejected
    pub fn insert(&mut self, record: MediaRecord) -> Result<(), ArchiveError> {
        match self.records.entry(record.key()) {
            btree_map::Entry::Occupied(entry) => Err(ArchiveError::Metadata(format!(
                "duplicate relative path: {}",
                entry.key()
            ))),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    pub fn get(&self, relative_path: &str) -> Option<&MediaRecord> {
        self.records.get(relative_path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Records in key order
    pub fn records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.records.values()
    }

    pub fn count_of(&self, kind: MediaKind) -> usize {
        self.records.values().filter(|r| r.media_kind == kind).count()
    }

    pub fn to_json(&self) -> Result<String, ArchiveError> {
        let stored: BTreeMap<&str, StoredRecord> = self
            .records
            .iter()
            .map(|(key, record)| (key.as_str(), record.to_stored()))
            .collect();
        Ok(serde_json::to_string_pretty(&stored)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ArchiveError> {
        let stored: BTreeMap<String, StoredRecord> = serde_json::from_str(content)?;
        let mut index = Self::new();
        for (key, value) in stored {
            index.insert(MediaRecord::from_stored(&key, value)?)?;
        }
        Ok(index)
    }

    /// Replace the file at `path` with this index
    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let dir = path
            .parent()
            .ok_or_else(|| ArchiveError::InvalidPath(path.to_path_buf()))?;
        let content = self.to_json()?;

        let mut temp = archive_temp_file(dir, ".json")?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| ArchiveError::Io(e.error))?;

        debug!("Wrote {} records to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
