//! # Media Archive Library
//!
//! Mirrors a media tree into a shadow archive of downscaled thumbnails and
//! video proxies, next to a `metadata.json` describing every media file.
//!
//! ## Module architecture:
//! - `config`: run parameters, validation and archive layout
//! - `error`: error taxonomy of the pipeline
//! - `classifier`: image / video / ignored decision from the file extension
//! - `shadow_path`: source path -> shadow directory and proxy path
//! - `metadata`: media records and the persisted metadata index
//! - `scanner`: directory traversal that skips the archive itself
//! - `image_processor`: image thumbnails
//! - `video_processor`: video proxies through FFmpeg
//! - `thumbnail`: dispatch between the two transcoders
//! - `archiver`: guard, discover and transcode phases with a worker pool
//! - `progress`: progress bar and run summary
//! - `platform`: external tool resolution
//! - `utils`: temporary files that become archive files
//!
//! ## Usage:
//! ```ignore
//! use media_archive::{ArchiveConfig, MediaArchiver};
//!
//! let archiver = MediaArchiver::new(&std::env::current_dir()?, ArchiveConfig::default())?;
//! let summary = archiver.run().await?;
//! println!("{}", summary);
//! ```

pub mod archiver;
pub mod classifier;
pub mod config;
pub mod error;
pub mod image_processor;
pub mod metadata;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod shadow_path;
pub mod thumbnail;
pub mod utils;
pub mod video_processor;

pub use archiver::{CancelHandle, MediaArchiver};
pub use classifier::{MediaKind, PathClassifier};
pub use config::{ArchiveConfig, ArchiveLayout};
pub use error::ArchiveError;
pub use metadata::{MediaRecord, MetadataIndex};
pub use progress::RunSummary;
pub use scanner::DirectoryScanner;
pub use shadow_path::{ShadowPathMapper, ShadowPaths};
pub use thumbnail::ThumbnailEngine;
