//! # Directory Scanner Module
//!
//! Walks the source tree and builds the metadata index.
//!
//! ## Rules:
//! - The archive root and everything below it is pruned, so previous output
//!   is never ingested again
//! - Symlinked files are indexed under the link's own path; symlinked
//!   directories are not descended
//! - Entries are visited in file name order, which is also the order in
//!   which files are later dispatched for transcoding
//! - Unreadable entries are logged and skipped, they never abort the scan
//!
//! ## Example:
//! ```ignore
//! let scanner = DirectoryScanner::new(&layout.source_root, &layout.archive_root);
//! let outcome = scanner.scan();
//! println!("{} media files", outcome.index.len());
//! ```

use crate::classifier::PathClassifier;
use crate::error::ArchiveError;
use crate::metadata::{MediaRecord, MetadataIndex};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Counters collected while scanning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files that became records
    pub discovered: usize,
    /// Files without an image/video MIME type
    pub ignored: usize,
    /// Entries that could not be read
    pub skipped: usize,
}

/// Index plus counters of a finished scan
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub index: MetadataIndex,
    pub report: ScanReport,
}

/// Walks a source root, excluding the archive root
pub struct DirectoryScanner {
    source_root: PathBuf,
    archive_root: PathBuf,
    classifier: PathClassifier,
}

impl DirectoryScanner {
    pub fn new(source_root: &Path, archive_root: &Path) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            archive_root: archive_root.to_path_buf(),
            classifier: PathClassifier::new(),
        }
    }

    /// True when the entry is the archive root or lies below it
    fn is_archived(&self, entry: &DirEntry) -> bool {
        entry.path().starts_with(&self.archive_root)
    }

    /// Scan the whole tree
    pub fn scan(&self) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        let walker = WalkDir::new(&self.source_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_archived(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    warn!("Skipping unreadable entry {}: {}", path, ArchiveError::Walk(e));
                    outcome.report.skipped += 1;
                    continue;
                }
            };

            let metadata = match file_metadata(&entry) {
                Ok(Some(metadata)) => metadata,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    outcome.report.skipped += 1;
                    continue;
                }
            };

            match self.scan_file(&entry, &metadata) {
                Ok(Some(record)) => match outcome.index.insert(record) {
                    Ok(()) => outcome.report.discovered += 1,
                    Err(e) => {
                        warn!("Skipping {}: {}", entry.path().display(), e);
                        outcome.report.skipped += 1;
                    }
                },
                Ok(None) => outcome.report.ignored += 1,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    outcome.report.skipped += 1;
                }
            }
        }

        outcome
    }

    fn scan_file(&self, entry: &DirEntry, metadata: &Metadata) -> Result<Option<MediaRecord>, ArchiveError> {
        let path = entry.path();

        let Some(classification) = self.classifier.classify(path) else {
            debug!("Ignoring non-media file: {}", path.display());
            return Ok(None);
        };

        let relative_path = path
            .strip_prefix(&self.source_root)
            .map_err(|_| ArchiveError::InvalidPath(path.to_path_buf()))?
            .to_path_buf();

        let record = MediaRecord::from_metadata(
            relative_path,
            path.to_path_buf(),
            classification.kind,
            classification.mime,
            metadata,
        )?;

        Ok(Some(record))
    }
}

/// Metadata of the regular file behind `entry`, `None` for anything else.
///
/// Symlinks are resolved here: a link to a file is indexed under the link's
/// path, a link to a directory is neither indexed nor descended.
fn file_metadata(entry: &DirEntry) -> Result<Option<Metadata>, ArchiveError> {
    if entry.path_is_symlink() {
        let metadata = std::fs::metadata(entry.path())?;
        return Ok(metadata.is_file().then_some(metadata));
    }

    if !entry.file_type().is_file() {
        return Ok(None);
    }
    Ok(Some(entry.metadata()?))
}
