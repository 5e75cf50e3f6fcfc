//! # Media Archiver Main Orchestrator
//!
//! Runs the three phases of an archive run:
//!
//! 1. **Guard**: refuse to run inside an archive folder
//! 2. **Discover**: scan the source tree and persist `metadata.json`
//! 3. **Transcode**: dispatch every record to a bounded worker pool
//!
//! Metadata is always fully written before the first transcode starts.
//! Per-file failures and timeouts end up in the `RunSummary`; the run still
//! completes. Cancellation stops dispatching new files, proxies already
//! written and the metadata file are kept.

use crate::{
    archiver::transcode_task::TranscodeTask,
    classifier::MediaKind,
    config::{ArchiveConfig, ArchiveLayout},
    error::ArchiveError,
    metadata::MetadataIndex,
    progress::{FileOutcome, ProgressManager, RunSummary},
    scanner::{DirectoryScanner, ScanOutcome},
    shadow_path::ShadowPathMapper,
    thumbnail::ensure_dir,
    video_processor::VideoTranscoder,
};
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Stops a running archive from dispatching more files
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fails when `root` is, or lies inside, a folder named `archive_dir_name`
pub fn check_guard(root: &Path, archive_dir_name: &str) -> Result<(), ArchiveError> {
    let inside_archive = root
        .ancestors()
        .any(|dir| dir.file_name() == Some(OsStr::new(archive_dir_name)));

    if inside_archive {
        return Err(ArchiveError::GuardViolation { root: root.to_path_buf() });
    }
    Ok(())
}

/// Main archive orchestrator
pub struct MediaArchiver {
    config: ArchiveConfig,
    layout: ArchiveLayout,
    cancel: CancelHandle,
    show_progress: bool,
}

impl MediaArchiver {
    /// Validate the configuration and apply the guard to `working_root`
    pub fn new(working_root: &Path, config: ArchiveConfig) -> Result<Self> {
        config.validate()?;

        let root = working_root
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", working_root.display()))?;
        check_guard(&root, &config.archive_dir_name)?;

        let layout = ArchiveLayout::new(&root, &config);

        Ok(Self {
            config,
            layout,
            cancel: CancelHandle::default(),
            show_progress: true,
        })
    }

    /// Disable the progress bar (tests, non-interactive runs)
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Execute guard-checked discover and transcode phases
    pub async fn run(&self) -> Result<RunSummary> {
        info!("Archiving media under: {}", self.layout.source_root.display());
        info!("Archive folder: {}", self.layout.archive_root.display());

        let outcome = self.discover().await?;
        let mut summary = RunSummary::from_scan(&outcome.report);

        info!(
            "Found {} media files ({} images, {} videos), {} ignored, {} unreadable",
            outcome.index.len(),
            outcome.index.count_of(MediaKind::Image),
            outcome.index.count_of(MediaKind::Video),
            outcome.report.ignored,
            outcome.report.skipped
        );

        if outcome.index.is_empty() {
            info!("No media files found to process");
            return Ok(summary);
        }

        if outcome.index.count_of(MediaKind::Video) > 0 {
            if let Err(e) = VideoTranscoder::check_dependencies().await {
                warn!("{}; video proxies will fail", e);
            }
        }

        self.transcode_all(Arc::new(outcome.index), &mut summary).await;
        self.print_final_stats(&summary);

        Ok(summary)
    }

    /// Scan the tree and replace the metadata file
    async fn discover(&self) -> Result<ScanOutcome> {
        ensure_dir(&self.layout.archive_root)
            .await
            .with_context(|| format!("Failed to create {}", self.layout.archive_root.display()))?;

        let scanner = DirectoryScanner::new(&self.layout.source_root, &self.layout.archive_root);
        let outcome = tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .context("Directory scan panicked")?;

        let metadata_path = self.layout.metadata_path.clone();
        let index = outcome.index.clone();
        tokio::task::spawn_blocking(move || index.save(&metadata_path))
            .await
            .context("Metadata writer panicked")?
            .with_context(|| format!("Failed to write {}", self.layout.metadata_path.display()))?;

        info!("Metadata written to {}", self.layout.metadata_path.display());
        Ok(outcome)
    }

    /// Transcode every record with at most `workers` files in flight
    async fn transcode_all(&self, index: Arc<MetadataIndex>, summary: &mut RunSummary) {
        let progress = if self.show_progress {
            ProgressManager::new(index.len() as u64)
        } else {
            ProgressManager::hidden()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mapper = ShadowPathMapper::new(&self.layout.archive_root, &self.config.proxy_suffix);
        let task = TranscodeTask::new(&self.config, mapper);

        let keys: Vec<String> = index.keys().map(str::to_string).collect();
        let mut tasks: Vec<(PathBuf, tokio::task::JoinHandle<FileOutcome>)> = Vec::new();

        for (position, key) in keys.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = keys.len() - position;
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // Waiting for a permit can take long; check again before dispatching
            if self.cancel.is_cancelled() {
                summary.cancelled = keys.len() - position;
                break;
            }

            let index = index.clone();
            let task = task.clone();
            let progress = progress.clone();
            let relative_path = PathBuf::from(key);
            let key = key.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = match index.get(&key) {
                    Some(record) => task.process(record).await,
                    None => FileOutcome::Failed {
                        relative_path: PathBuf::from(&key),
                        error: ArchiveError::Metadata(format!("record vanished: {}", key)),
                    },
                };

                let message = match &outcome {
                    FileOutcome::Transcoded { .. } => format!("[OK] {}", key),
                    FileOutcome::Failed { .. } => format!("[ERROR] {}", key),
                };
                progress.update(&message);
                outcome
            });

            tasks.push((relative_path, handle));
        }

        if summary.cancelled > 0 {
            warn!(
                "Run cancelled, {} files were not dispatched; waiting for {} in flight",
                summary.cancelled,
                tasks.len()
            );
        }

        for (relative_path, handle) in tasks {
            match handle.await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!("Worker for {} crashed: {}", relative_path.display(), e);
                    summary.record(FileOutcome::Failed {
                        relative_path,
                        error: ArchiveError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)),
                    });
                }
            }
        }

        progress.finish(&summary.to_string());
    }

    fn print_final_stats(&self, summary: &RunSummary) {
        info!("=== Archive Complete ===");
        info!("Media files discovered: {}", summary.discovered);
        info!("Proxies written: {}", summary.transcoded);
        info!("Failures: {}", summary.failed);
        info!("Unreadable entries skipped: {}", summary.scan_skipped);
        if summary.cancelled > 0 {
            info!("Not processed (cancelled): {}", summary.cancelled);
        }
        for failure in &summary.failures {
            info!("  failed: {} ({})", failure.relative_path.display(), failure.error);
        }
        info!("Check the '{}' folder for results", self.layout.archive_root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn archiver(root: &Path, config: ArchiveConfig) -> MediaArchiver {
        MediaArchiver::new(root, config).unwrap().without_progress()
    }

    fn small_config() -> ArchiveConfig {
        ArchiveConfig {
            image_max_width: 144,
            image_max_height: 144,
            workers: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_guard() {
        assert!(check_guard(Path::new("/photos"), "Media-archive").is_ok());
        assert!(check_guard(Path::new("/photos/Media-archive"), "Media-archive").is_err());
        assert!(check_guard(Path::new("/photos/Media-archive/2023"), "Media-archive").is_err());
        assert!(check_guard(Path::new("/photos/Media-archive-old"), "Media-archive").is_ok());
    }

    #[test]
    fn test_guard_violation_aborts_before_any_work() {
        let temp_dir = TempDir::new().unwrap();
        let inside = temp_dir.path().join("Media-archive");
        fs::create_dir_all(&inside).unwrap();
        fs::write(inside.join("a.jpg"), b"x").unwrap();

        let err = MediaArchiver::new(&inside, ArchiveConfig::default()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::GuardViolation { .. })
        ));
        assert!(!inside.join("Media-archive").exists());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = ArchiveConfig { workers: 0, ..Default::default() };
        assert!(MediaArchiver::new(temp_dir.path(), config).is_err());
    }

    #[tokio::test]
    async fn test_run_writes_metadata_and_proxies() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("2023")).unwrap();
        RgbImage::from_pixel(600, 400, Rgb([200, 100, 0])).save(root.join("a.jpg")).unwrap();
        RgbImage::from_pixel(90, 300, Rgb([0, 100, 200])).save(root.join("2023/b.png")).unwrap();
        fs::write(root.join("notes.txt"), b"not media").unwrap();

        let archiver = archiver(root, small_config());
        let summary = archiver.run().await.unwrap();

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.transcoded, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.ignored, 1);
        assert!(summary.is_complete());

        let archive = &archiver.layout().archive_root;
        assert_eq!(image::image_dimensions(archive.join("a-thumbnail.jpg")).unwrap(), (144, 96));
        assert_eq!(image::image_dimensions(archive.join("2023/b-thumbnail.png")).unwrap(), (43, 144));

        let index = MetadataIndex::load(&archiver.layout().metadata_path).unwrap();
        let keys: Vec<&str> = index.keys().collect();
        assert_eq!(keys, vec!["2023/b.png", "a.jpg"]);
        assert_eq!(index.get("a.jpg").unwrap().mime_type, "image/jpeg");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_archive_files_are_readable_like_regular_files() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        RgbImage::from_pixel(60, 40, Rgb([5, 5, 5])).save(root.join("a.jpg")).unwrap();
        fs::write(root.join("reference.txt"), b"x").unwrap();

        let archiver = archiver(root, small_config());
        archiver.run().await.unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        let expected = mode(&root.join("reference.txt"));
        assert_eq!(mode(&archiver.layout().metadata_path), expected);
        assert_eq!(mode(&archiver.layout().archive_root.join("a-thumbnail.jpg")), expected);
    }

    #[tokio::test]
    async fn test_corrupt_file_does_not_stop_the_run() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a-broken.jpg"), b"garbage").unwrap();
        RgbImage::from_pixel(300, 300, Rgb([1, 2, 3])).save(root.join("b-good.jpg")).unwrap();

        let config = ArchiveConfig { workers: 1, ..small_config() };
        let archiver = archiver(root, config);
        let summary = archiver.run().await.unwrap();

        assert_eq!(summary.transcoded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].relative_path, PathBuf::from("a-broken.jpg"));
        assert!(summary.is_complete());

        let archive = &archiver.layout().archive_root;
        assert!(!archive.join("a-broken-thumbnail.jpg").exists());
        assert!(archive.join("b-good-thumbnail.jpg").exists());

        // Failed files keep their metadata entry
        let index = MetadataIndex::load(&archiver.layout().metadata_path).unwrap();
        assert!(index.get("a-broken.jpg").is_some());
    }

    #[tokio::test]
    async fn test_rerun_overwrites_metadata_with_same_content() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        RgbImage::from_pixel(50, 50, Rgb([9, 9, 9])).save(root.join("a.png")).unwrap();

        let archiver = archiver(root, small_config());
        archiver.run().await.unwrap();
        let first = fs::read_to_string(&archiver.layout().metadata_path).unwrap();

        let summary = archiver.run().await.unwrap();
        let second = fs::read_to_string(&archiver.layout().metadata_path).unwrap();

        // Previous proxies are never picked up as new media
        assert_eq!(summary.discovered, 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_archive_only_tree_has_no_work() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Media-archive")).unwrap();
        RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]))
            .save(root.join("Media-archive/a-thumbnail.png"))
            .unwrap();

        let archiver = archiver(root, small_config());
        let summary = archiver.run().await.unwrap();

        assert_eq!(summary, RunSummary::default());
        let index = MetadataIndex::load(&archiver.layout().metadata_path).unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_dispatches_nothing_but_keeps_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        RgbImage::from_pixel(20, 20, Rgb([0, 0, 0])).save(root.join("a.png")).unwrap();
        RgbImage::from_pixel(20, 20, Rgb([0, 0, 0])).save(root.join("b.png")).unwrap();

        let archiver = archiver(root, small_config());
        archiver.cancel_handle().cancel();
        let summary = archiver.run().await.unwrap();

        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.transcoded, 0);
        assert!(!summary.is_complete());
        assert_eq!(MetadataIndex::load(&archiver.layout().metadata_path).unwrap().len(), 2);
        assert!(!archiver.layout().archive_root.join("a-thumbnail.png").exists());
    }
}
