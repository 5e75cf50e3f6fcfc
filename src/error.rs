//! # Error Types Module
//!
//! Defines every error the archive pipeline can produce.
//!
//! ## Categories:
//! - `GuardViolation`: the run was started inside the archive folder (fatal)
//! - `Io` / `Walk`: filesystem problems while scanning or writing proxies
//! - `Image`: decode/encode failures of the image thumbnailer
//! - `FFmpeg`: non-zero exit of the video transcoder
//! - `Timeout`: a single transcode exceeded its time budget
//! - `InvalidPath`: a relative path that cannot be mirrored safely
//! - `Metadata`: serialization of the metadata index
//! - `MissingDependency`: external tool not found
//! - `Validation`: invalid configuration
//!
//! Only `GuardViolation`, `Validation` and a failure to persist the metadata
//! abort a run. Everything else is recovered per file by the archiver and
//! ends up in the run summary.

use std::path::PathBuf;
use std::time::Duration;

/// Custom error types for the media archive
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("refusing to run inside the archive folder: {}", .root.display())]
    GuardViolation { root: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("Transcode timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Invalid archive path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Configuration error: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        ArchiveError::Metadata(err.to_string())
    }
}

impl ArchiveError {
    /// True for the conditions that must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArchiveError::GuardViolation { .. } | ArchiveError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_violation_is_fatal() {
        let err = ArchiveError::GuardViolation { root: PathBuf::from("/photos/Media-archive") };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Media-archive"));
    }

    #[test]
    fn test_per_file_errors_are_not_fatal() {
        assert!(!ArchiveError::FFmpeg("boom".to_string()).is_fatal());
        assert!(!ArchiveError::Timeout(Duration::from_secs(3)).is_fatal());
        assert_eq!(
            ArchiveError::Timeout(Duration::from_secs(3)).to_string(),
            "Transcode timed out after 3s"
        );
    }
}
