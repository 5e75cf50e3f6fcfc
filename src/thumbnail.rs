//! # Thumbnail Engine Module
//!
//! Dispatches a record to the image thumbnailer or the video transcoder
//! according to its `MediaKind`. Both variants share one contract: the
//! shadow directory is created first, then the proxy is written or an error
//! is returned. Errors stay with the single file; the archiver decides what
//! to do with them.

use crate::classifier::MediaKind;
use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::image_processor::ImageThumbnailer;
use crate::metadata::MediaRecord;
use crate::shadow_path::ShadowPaths;
use crate::video_processor::VideoTranscoder;
use std::path::{Path, PathBuf};

/// Transcoder variants, one per media kind
#[derive(Debug, Clone)]
pub struct ThumbnailEngine {
    image: ImageThumbnailer,
    video: VideoTranscoder,
}

impl ThumbnailEngine {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            image: ImageThumbnailer::new(config),
            video: VideoTranscoder::new(config),
        }
    }

    /// Produce the proxy of `record` at `paths.proxy_path`
    pub async fn render(&self, record: &MediaRecord, paths: &ShadowPaths) -> Result<PathBuf, ArchiveError> {
        ensure_dir(&paths.shadow_dir).await?;

        let source = &record.source_absolute_path;
        match record.media_kind {
            MediaKind::Image => self.image.render(source, &paths.proxy_path).await,
            MediaKind::Video => self.video.render(source, &paths.proxy_path).await,
        }
    }
}

/// Create a directory tree; concurrent creators all succeed
pub async fn ensure_dir(dir: &Path) -> Result<(), ArchiveError> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow_path::ShadowPathMapper;
    use image::{Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_concurrent_directory_creation() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Arc::new(temp_dir.path().join("a/b/c"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let dir = dir.clone();
                tokio::spawn(async move { ensure_dir(&dir).await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }
        assert!(dir.is_dir());
        ensure_dir(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_image_record_creates_shadow_dir_and_proxy() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("2023")).unwrap();
        let source = root.join("2023/a.jpg");
        RgbImage::from_pixel(300, 200, Rgb([10, 20, 30])).save(&source).unwrap();

        let record = MediaRecord {
            relative_path: PathBuf::from("2023/a.jpg"),
            filename: "a.jpg".to_string(),
            media_kind: MediaKind::Image,
            mime_type: "image/jpeg".to_string(),
            size_bytes: 0,
            modified_at: 0.0,
            created_at: 0.0,
            source_absolute_path: source,
        };

        let config = ArchiveConfig {
            image_max_width: 150,
            image_max_height: 150,
            ..Default::default()
        };
        let mapper = ShadowPathMapper::new(&root.join("Media-archive"), &config.proxy_suffix);
        let paths = mapper.map(&record.relative_path).unwrap();

        let written = ThumbnailEngine::new(&config).render(&record, &paths).await.unwrap();
        assert_eq!(written, root.join("Media-archive/2023/a-thumbnail.jpg"));
        assert_eq!(image::image_dimensions(&written).unwrap(), (150, 100));
    }
}
