//! # Path Classifier Module
//!
//! Decides whether a file is an image, a video, or something the archive
//! ignores. Classification is extension based: the MIME type is guessed from
//! the file suffix with `mime_guess`, the content is never sniffed. A renamed
//! file with a misleading extension is therefore misclassified, and files
//! without an extension are never archived.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of media carried by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Derive the kind from a MIME string such as `image/jpeg`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top_level = mime.split('/').next()?.trim();
        if top_level.eq_ignore_ascii_case("image") {
            Some(MediaKind::Image)
        } else if top_level.eq_ignore_ascii_case("video") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Result of a successful classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: MediaKind,
    pub mime: String,
}

/// Extension based media classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct PathClassifier;

impl PathClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a path, `None` when it is not an image or a video
    pub fn classify(&self, path: &Path) -> Option<Classification> {
        let mime = mime_guess::from_path(path).first()?;
        let essence = mime.essence_str().to_string();
        let kind = MediaKind::from_mime(&essence)?;
        Some(Classification { kind, mime: essence })
    }
}
