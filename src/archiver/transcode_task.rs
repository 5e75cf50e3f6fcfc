//! # Transcode Task Module
//!
//! Worker for a single record: map the shadow paths, run the matching
//! transcoder under a time budget and turn whatever happens into a
//! `FileOutcome`. Nothing escapes this function as an error.

use crate::{
    config::ArchiveConfig,
    error::ArchiveError,
    metadata::MediaRecord,
    progress::FileOutcome,
    shadow_path::ShadowPathMapper,
    thumbnail::ThumbnailEngine,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error};

/// Everything a worker needs, cheap to clone into spawned tasks
#[derive(Debug, Clone)]
pub struct TranscodeTask {
    config: ArchiveConfig,
    mapper: ShadowPathMapper,
    engine: ThumbnailEngine,
    /// Overrides the per-kind budget of the config
    budget: Option<Duration>,
}

impl TranscodeTask {
    pub fn new(config: &ArchiveConfig, mapper: ShadowPathMapper) -> Self {
        Self {
            config: config.clone(),
            mapper,
            engine: ThumbnailEngine::new(config),
            budget: None,
        }
    }

    /// Same time budget for every record regardless of its kind
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Produce the proxy of one record
    pub async fn process(&self, record: &MediaRecord) -> FileOutcome {
        match self.try_process(record).await {
            Ok(proxy_path) => {
                debug!("Proxy written: {}", proxy_path.display());
                FileOutcome::Transcoded {
                    relative_path: record.relative_path.clone(),
                    proxy_path,
                }
            }
            Err(e) => {
                error!(
                    "Failed to process {} {}: {}",
                    record.media_kind,
                    record.source_absolute_path.display(),
                    e
                );
                FileOutcome::Failed {
                    relative_path: record.relative_path.clone(),
                    error: e,
                }
            }
        }
    }

    async fn try_process(&self, record: &MediaRecord) -> Result<PathBuf, ArchiveError> {
        let paths = self.mapper.map(&record.relative_path)?;
        let budget = self
            .budget
            .unwrap_or_else(|| self.config.timeout_for(record.media_kind));

        tokio::time::timeout(budget, self.engine.render(record, &paths))
            .await
            .map_err(|_| ArchiveError::Timeout(budget))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MediaKind;
    use crate::progress::RunSummary;
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn record(root: &Path, relative: &str, kind: MediaKind) -> MediaRecord {
        MediaRecord {
            relative_path: PathBuf::from(relative),
            filename: Path::new(relative).file_name().unwrap().to_string_lossy().into_owned(),
            media_kind: kind,
            mime_type: String::new(),
            size_bytes: 0,
            modified_at: 0.0,
            created_at: 0.0,
            source_absolute_path: root.join(relative),
        }
    }

    fn task(root: &Path, config: &ArchiveConfig) -> TranscodeTask {
        TranscodeTask::new(config, ShadowPathMapper::new(&root.join("Media-archive"), "-thumbnail"))
    }

    #[tokio::test]
    async fn test_success_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        RgbImage::from_pixel(40, 20, Rgb([0, 0, 0])).save(root.join("a.png")).unwrap();

        let outcome = task(root, &ArchiveConfig::default())
            .process(&record(root, "a.png", MediaKind::Image))
            .await;
        match outcome {
            FileOutcome::Transcoded { proxy_path, .. } => {
                assert_eq!(proxy_path, root.join("Media-archive/a-thumbnail.png"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_budget_is_a_timeout_failure() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        RgbImage::from_fn(2400, 1800, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]))
            .save(root.join("big.png"))
            .unwrap();

        let outcome = task(root, &ArchiveConfig::default())
            .with_budget(Duration::from_millis(1))
            .process(&record(root, "big.png", MediaKind::Image))
            .await;

        let mut summary = RunSummary::default();
        match outcome {
            FileOutcome::Failed { ref error, .. } => {
                assert!(matches!(error, ArchiveError::Timeout(budget) if *budget == Duration::from_millis(1)));
            }
            ref other => panic!("unexpected outcome: {:?}", other),
        }
        summary.record(outcome);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].relative_path, PathBuf::from("big.png"));

        // The abandoned render never publishes
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!root.join("Media-archive/big-thumbnail.png").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let outcome = task(root, &ArchiveConfig::default())
            .process(&record(root, "gone.jpg", MediaKind::Image))
            .await;
        assert!(matches!(outcome, FileOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_unmappable_path_is_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let outcome = task(root, &ArchiveConfig::default())
            .process(&record(root, "Media-archive/a.jpg", MediaKind::Image))
            .await;
        match outcome {
            FileOutcome::Failed { error, .. } => assert!(matches!(error, ArchiveError::InvalidPath(_))),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
