//! # Configuration Management Module
//!
//! Holds every tunable of an archive run and the directory layout derived
//! from the working root.
//!
//! ## Parameters:
//! - `archive_dir_name`: archive folder created under the source root (default: "Media-archive")
//! - `metadata_file_name`: metadata index inside the archive (default: "metadata.json")
//! - `proxy_suffix`: inserted before the extension of every proxy (default: "-thumbnail")
//! - `image_max_width` / `image_max_height`: thumbnail bounding box (default: 1440x1440)
//! - `jpeg_quality`: JPEG re-encode quality (1-100, default: 75)
//! - `optimize_images`: best compression for lossless formats (default: true)
//! - `video_target_width`: proxy video width (default: 640)
//! - `video_crf`: x264 CRF (0-51, default: 28)
//! - `video_preset`: x264 speed/quality preset (default: "medium")
//! - `workers`: transcode worker pool size (default: 4)
//! - `image_timeout_secs` / `video_timeout_secs`: per-file time budget
//!
//! ## Example:
//! ```ignore
//! let config = ArchiveConfig {
//!     video_crf: 24,
//!     workers: 1,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::ArchiveError;
use crate::classifier::MediaKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// x264 presets accepted by ffmpeg
pub const VIDEO_PRESETS: &[&str] = &[
    "ultrafast", "superfast", "veryfast", "faster", "fast",
    "medium", "slow", "slower", "veryslow", "placebo",
];

/// Configuration for an archive run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Folder under the source root that receives all output
    pub archive_dir_name: String,
    /// Metadata index file name inside the archive folder
    pub metadata_file_name: String,
    /// Inserted between file stem and extension of every proxy
    pub proxy_suffix: String,
    /// Maximum thumbnail width
    pub image_max_width: u32,
    /// Maximum thumbnail height
    pub image_max_height: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Use the slowest/smallest settings of lossless encoders
    pub optimize_images: bool,
    /// Width of video proxies; height follows the aspect ratio
    pub video_target_width: u32,
    /// Video CRF value (0-51, lower = better quality)
    pub video_crf: u8,
    /// x264 preset
    pub video_preset: String,
    /// Number of parallel workers
    pub workers: usize,
    /// Time budget for a single image
    pub image_timeout_secs: u64,
    /// Time budget for a single video
    pub video_timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_dir_name: "Media-archive".to_string(),
            metadata_file_name: "metadata.json".to_string(),
            proxy_suffix: "-thumbnail".to_string(),
            image_max_width: 1440,
            image_max_height: 1440,
            jpeg_quality: 75,
            optimize_images: true,
            video_target_width: 640,
            video_crf: 28,
            video_preset: "medium".to_string(),
            workers: 4,
            image_timeout_secs: 180,
            video_timeout_secs: 900,
        }
    }
}

impl ArchiveConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if !is_single_component(&self.archive_dir_name) {
            return Err(ArchiveError::Validation(format!(
                "Archive folder name must be a single path component: {:?}",
                self.archive_dir_name
            )));
        }

        if !is_single_component(&self.metadata_file_name) {
            return Err(ArchiveError::Validation(format!(
                "Metadata file name must be a single path component: {:?}",
                self.metadata_file_name
            )));
        }

        if self.proxy_suffix.is_empty() || self.proxy_suffix.contains(['/', '\\']) {
            return Err(ArchiveError::Validation(
                "Proxy suffix must be non-empty and contain no path separators".to_string(),
            ));
        }

        if self.image_max_width == 0 || self.image_max_height == 0 {
            return Err(ArchiveError::Validation(
                "Thumbnail dimensions must be greater than 0".to_string(),
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ArchiveError::Validation("JPEG quality must be between 1 and 100".to_string()));
        }

        // libx264 rejects odd frame sizes
        if self.video_target_width == 0 || self.video_target_width % 2 != 0 {
            return Err(ArchiveError::Validation(
                "Video target width must be a positive even number".to_string(),
            ));
        }

        if self.video_crf > 51 {
            return Err(ArchiveError::Validation("Video CRF must be between 0 and 51".to_string()));
        }

        if !VIDEO_PRESETS.contains(&self.video_preset.as_str()) {
            return Err(ArchiveError::Validation(format!(
                "Unknown video preset: {}",
                self.video_preset
            )));
        }

        if self.workers == 0 {
            return Err(ArchiveError::Validation("Number of workers must be greater than 0".to_string()));
        }

        if self.image_timeout_secs == 0 || self.video_timeout_secs == 0 {
            return Err(ArchiveError::Validation("Timeouts must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Time budget for one transcode of the given kind
    pub fn timeout_for(&self, kind: MediaKind) -> Duration {
        match kind {
            MediaKind::Image => Duration::from_secs(self.image_timeout_secs),
            MediaKind::Video => Duration::from_secs(self.video_timeout_secs),
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: ArchiveConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Absolute locations of one run
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    pub source_root: PathBuf,
    pub archive_root: PathBuf,
    pub metadata_path: PathBuf,
}

impl ArchiveLayout {
    pub fn new(source_root: &Path, config: &ArchiveConfig) -> Self {
        let archive_root = source_root.join(&config.archive_dir_name);
        let metadata_path = archive_root.join(&config.metadata_file_name);

        Self {
            source_root: source_root.to_path_buf(),
            archive_root,
            metadata_path,
        }
    }
}
