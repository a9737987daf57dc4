//! Archive provider backed by a directory tree on disk.

use super::{ArchiveProvider, GameFile};
use crate::utils::{BackupError, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Enumerates every regular file below `root`.
///
/// Paths are relative to `root` and always use `/` separators. Loose files on
/// disk are never encrypted.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    follow_links: bool,
    excluded: Vec<PathBuf>,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: false,
            excluded: Vec::new(),
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Skip the directory tree at `dir`, e.g. the backup folder when it lives
    /// under the archive root.
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveProvider for DirectoryProvider {
    fn files(&self, cancel: &CancellationToken) -> Result<Vec<GameFile>> {
        let mut files = Vec::new();

        // Directories that do not exist yet cannot contain anything.
        let excluded: Vec<PathBuf> = self
            .excluded
            .iter()
            .filter_map(|dir| dir.canonicalize().ok())
            .collect();
        let is_excluded = |entry: &walkdir::DirEntry| {
            !excluded.is_empty()
                && entry.file_type().is_dir()
                && entry
                    .path()
                    .canonicalize()
                    .map(|path| excluded.contains(&path))
                    .unwrap_or(false)
        };

        for entry in WalkDir::new(&self.root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry))
        {
            if cancel.is_cancelled() {
                return Err(BackupError::Cancelled);
            }

            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            files.push(GameFile {
                path,
                size: entry.metadata().map_err(std::io::Error::from)?.len(),
                is_encrypted: false,
            });
        }

        tracing::debug!("Enumerated {} files under {}", files.len(), self.root.display());
        Ok(files)
    }
}
