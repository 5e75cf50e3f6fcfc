//! # Progress Tracking and Run Summary Module
//!
//! ## Components:
//! - `ProgressManager`: indicatif progress bar over the transcode phase
//! - `RunSummary`: counters of one run plus the list of failed files
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [=======================>----------------] 84/150 (56%) [OK] 2023/a.jpg
//! ```

use crate::error::ArchiveError;
use crate::scanner::ScanReport;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Manages progress reporting of the transcode phase
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that draws nothing
    pub fn hidden() -> Self {
        Self { bar: ProgressBar::hidden() }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// A file whose proxy could not be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub relative_path: PathBuf,
    pub error: String,
}

/// Outcome of a single transcode attempt
#[derive(Debug)]
pub enum FileOutcome {
    Transcoded { relative_path: PathBuf, proxy_path: PathBuf },
    Failed { relative_path: PathBuf, error: ArchiveError },
}

/// Totals of one archive run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records in the metadata index
    pub discovered: usize,
    /// Unreadable entries during the scan
    pub scan_skipped: usize,
    /// Non-media files
    pub ignored: usize,
    pub transcoded: usize,
    pub failed: usize,
    /// Records never dispatched because the run was cancelled
    pub cancelled: usize,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    pub fn from_scan(report: &ScanReport) -> Self {
        Self {
            discovered: report.discovered,
            scan_skipped: report.skipped,
            ignored: report.ignored,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Transcoded { .. } => self.transcoded += 1,
            FileOutcome::Failed { relative_path, error } => {
                self.failed += 1;
                self.failures.push(FileFailure {
                    relative_path,
                    error: error.to_string(),
                });
            }
        }
    }

    /// Every discovered record was either transcoded or failed
    pub fn is_complete(&self) -> bool {
        self.cancelled == 0 && self.transcoded + self.failed == self.discovered
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Discovered: {} | Transcoded: {} | Failed: {} | Skipped: {} | Ignored: {}",
            self.discovered, self.transcoded, self.failed, self.scan_skipped, self.ignored
        )?;
        if self.cancelled > 0 {
            write!(f, " | Cancelled: {}", self.cancelled)?;
        }
        Ok(())
    }
}
