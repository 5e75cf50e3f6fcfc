//! # Archiver Module
//!
//! - `media_archiver`: orchestrator of a whole run
//! - `transcode_task`: worker for a single record

pub mod media_archiver;
pub mod transcode_task;

pub use media_archiver::{check_guard, CancelHandle, MediaArchiver};
pub use transcode_task::TranscodeTask;
