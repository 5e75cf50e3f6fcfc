//! # Shadow Path Module
//!
//! Centralizes the computation of where a record's proxy lives in the
//! archive. The shadow directory mirrors the record's parent directory under
//! the archive root and the proxy name is `<stem><suffix><.ext>`.
//!
//! The mapping only accepts plain relative paths that do not start with the
//! archive folder itself, so a proxy can never be written into the archive's
//! own mirrored copy of the archive.

use crate::error::ArchiveError;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// Mirrored locations of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowPaths {
    pub shadow_dir: PathBuf,
    pub proxy_path: PathBuf,
}

/// Maps source relative paths to archive locations
#[derive(Debug, Clone)]
pub struct ShadowPathMapper {
    archive_root: PathBuf,
    proxy_suffix: String,
}

impl ShadowPathMapper {
    pub fn new(archive_root: &Path, proxy_suffix: &str) -> Self {
        Self {
            archive_root: archive_root.to_path_buf(),
            proxy_suffix: proxy_suffix.to_string(),
        }
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    /// Compute shadow directory and proxy path for a relative path.
    ///
    /// The proxy name is derived from the raw file name, so names that are
    /// not valid UTF-8 still map to distinct proxies.
    pub fn map(&self, relative_path: &Path) -> Result<ShadowPaths, ArchiveError> {
        self.check_relative(relative_path)?;
        let filename = relative_path
            .file_name()
            .ok_or_else(|| ArchiveError::InvalidPath(relative_path.to_path_buf()))?;

        let parent = relative_path.parent().unwrap_or(Path::new(""));
        let shadow_dir = self.archive_root.join(parent);
        let proxy_path = shadow_dir.join(self.proxy_file_name(filename));

        Ok(ShadowPaths { shadow_dir, proxy_path })
    }

    /// `a.jpg` -> `a-thumbnail.jpg`, `README` -> `README-thumbnail`
    pub fn proxy_file_name(&self, filename: &OsStr) -> OsString {
        let name = Path::new(filename);
        let stem = name.file_stem().unwrap_or(name.as_os_str());

        let mut proxy = stem.to_os_string();
        proxy.push(&self.proxy_suffix);
        if let Some(ext) = name.extension() {
            proxy.push(".");
            proxy.push(ext);
        }
        proxy
    }

    fn check_relative(&self, relative_path: &Path) -> Result<(), ArchiveError> {
        let archive_name = self.archive_root.file_name();
        let mut components = relative_path.components().peekable();

        if components.peek().is_none() {
            return Err(ArchiveError::InvalidPath(relative_path.to_path_buf()));
        }

        for (position, component) in components.enumerate() {
            match component {
                Component::Normal(part) => {
                    if position == 0 && Some(part) == archive_name {
                        return Err(ArchiveError::InvalidPath(relative_path.to_path_buf()));
                    }
                }
                _ => return Err(ArchiveError::InvalidPath(relative_path.to_path_buf())),
            }
        }

        Ok(())
    }
}
