//! # Utility Functions Module
//!
//! Helpers shared by everything that writes into the archive.

use std::io;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

/// Requested mode of archive files; the process umask still applies
#[cfg(unix)]
const ARCHIVE_FILE_MODE: u32 = 0o666;

/// Temporary file in `dir` that is later persisted as an archive file.
///
/// `tempfile` creates owner-only files and `persist` keeps the mode, so the
/// mode of a regular file is requested up front.
pub fn archive_temp_file(dir: &Path, suffix: &str) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(".tmp-").suffix(suffix);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(ARCHIVE_FILE_MODE));
    }

    builder.tempfile_in(dir)
}
