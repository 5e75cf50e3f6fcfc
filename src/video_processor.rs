//! # Video Processing Module
//!
//! Produces the proxy of a video record by shelling out to FFmpeg.
//!
//! ## Encoding parameters:
//! - Scale: `scale=<target_width>:-2`, height follows the aspect ratio and
//!   is rounded to an even number as libx264 requires
//! - Video codec: libx264 with configurable preset (default `medium`)
//! - CRF: configurable (default 28)
//! - Audio codec: AAC
//!
//! ## CRF guide:
//! - 18-23: high quality
//! - 24-28: good quality, small files (default)
//! - 29+: visibly degraded
//!
//! FFmpeg writes into a temporary file next to the proxy which is renamed on
//! success. The child process is killed when the future is dropped, so a
//! timed-out or cancelled transcode does not keep running in the background.

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::platform::PlatformCommands;
use crate::utils::archive_temp_file;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Handles video proxies
#[derive(Debug, Clone)]
pub struct VideoTranscoder {
    target_width: u32,
    crf: u8,
    preset: String,
}

impl VideoTranscoder {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            target_width: config.video_target_width,
            crf: config.video_crf,
            preset: config.video_preset.clone(),
        }
    }

    /// FFmpeg arguments for one transcode
    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-i".into()];
        args.push(input.as_os_str().to_os_string());
        args.extend(
            [
                "-vf".to_string(),
                format!("scale={}:-2", self.target_width),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                self.preset.clone(),
                "-crf".to_string(),
                self.crf.to_string(),
                "-c:a".to_string(),
                "aac".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-y".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_os_string());
        args
    }

    /// Transcode `source` into `proxy`
    pub async fn render(&self, source: &Path, proxy: &Path) -> Result<PathBuf, ArchiveError> {
        let dir = proxy
            .parent()
            .ok_or_else(|| ArchiveError::InvalidPath(proxy.to_path_buf()))?;

        // FFmpeg picks the container from the extension
        let suffix = proxy
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let temp = archive_temp_file(dir, &suffix)?;

        let ffmpeg = PlatformCommands::instance().get_command("ffmpeg");
        debug!(
            "Transcoding {} (width: {}, CRF: {}, preset: {})",
            source.display(),
            self.target_width,
            self.crf,
            self.preset
        );

        let start_time = std::time::Instant::now();
        let output = Command::new(ffmpeg)
            .args(self.ffmpeg_args(source, temp.path()))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ArchiveError::MissingDependency(format!("{} is required for video processing", ffmpeg))
                }
                _ => ArchiveError::Io(e),
            })?;

        if !output.status.success() {
            return Err(ArchiveError::FFmpeg(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        temp.persist(proxy).map_err(|e| ArchiveError::Io(e.error))?;
        debug!(
            "Video transcode of {} completed in {:.1}s",
            source.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(proxy.to_path_buf())
    }

    /// Check if ffmpeg is available
    pub async fn check_dependencies() -> Result<(), ArchiveError> {
        if !PlatformCommands::instance().is_command_available("ffmpeg").await {
            return Err(ArchiveError::MissingDependency(
                "ffmpeg is required for video processing".to_string(),
            ));
        }
        Ok(())
    }
}
