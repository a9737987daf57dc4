//! Archive providers: the source of files recorded in a backup.

pub mod directory;

use crate::manifest::BackupRecord;
use crate::utils::Result;
use tokio_util::sync::CancellationToken;

pub use directory::DirectoryProvider;

/// Extensions of the raw payload companions that sit next to a package file.
const PACKAGE_PAYLOAD_EXTENSIONS: &[&str] = &["uexp", "ubulk", "uptnl"];

/// A file known to an archive provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFile {
    pub path: String,
    pub size: u64,
    pub is_encrypted: bool,
}

impl GameFile {
    pub fn new(path: impl Into<String>, size: u64, is_encrypted: bool) -> Self {
        Self {
            path: path.into(),
            size,
            is_encrypted,
        }
    }

    /// Lowercased extension of the last path segment, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// Whether this file is only a payload companion of a package.
    pub fn is_package_payload(&self) -> bool {
        self.extension()
            .is_some_and(|ext| PACKAGE_PAYLOAD_EXTENSIONS.contains(&ext.as_str()))
    }
}

impl From<&GameFile> for BackupRecord {
    fn from(file: &GameFile) -> Self {
        BackupRecord::new(file.size, file.is_encrypted, file.path.clone())
    }
}

/// Enumerates the files a backup should snapshot.
///
/// Implementations should check `cancel` between entries and return
/// [`crate::BackupError::Cancelled`] once it fires.
pub trait ArchiveProvider: Send + Sync {
    fn files(&self, cancel: &CancellationToken) -> Result<Vec<GameFile>>;
}

/// Records for every primary file, skipping payload companions.
pub fn collect_records(files: &[GameFile]) -> Vec<BackupRecord> {
    files
        .iter()
        .filter(|f| !f.is_package_payload())
        .map(BackupRecord::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_detection() {
        assert!(GameFile::new("Game/Content/Hero.uexp", 1, false).is_package_payload());
        assert!(GameFile::new("Game/Content/Hero.UBULK", 1, false).is_package_payload());
        assert!(GameFile::new("Game/Content/Hero.uptnl", 1, false).is_package_payload());
        assert!(!GameFile::new("Game/Content/Hero.uasset", 1, false).is_package_payload());
        assert!(!GameFile::new("Game/Content/Map.umap", 1, false).is_package_payload());
        assert!(!GameFile::new("Game/Content/uexp", 1, false).is_package_payload());
        assert!(!GameFile::new("Game/uexp.dir/README", 1, false).is_package_payload());
    }

    #[test]
    fn test_collect_records_skips_companions() {
        let files = vec![
            GameFile::new("Game/Content/A.uasset", 100, false),
            GameFile::new("Game/Content/A.uexp", 900, false),
            GameFile::new("Game/Content/A.ubulk", 4000, true),
            GameFile::new("Game/Content/Map.umap", 50, true),
            GameFile::new("Game/Content/Map.uptnl", 5, false),
            GameFile::new("Game/Config/DefaultGame.ini", 10, false),
        ];

        let records = collect_records(&files);
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "Game/Content/A.uasset",
                "Game/Content/Map.umap",
                "Game/Config/DefaultGame.ini"
            ]
        );
        assert!(records[1].is_encrypted);
        assert_eq!(records[0].size, 100);
    }

    #[test]
    fn test_collect_records_mixed_sets() {
        // Every combination of primary/companion flags over a small set.
        let names = ["a.uasset", "a.uexp", "b.ubulk", "c.umap", "d.uptnl"];
        for mask in 0u32..(1 << names.len()) {
            let files: Vec<GameFile> = names
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << *i) != 0)
                .map(|(_, n)| GameFile::new(format!("Game/{n}"), 1, false))
                .collect();

            let records = collect_records(&files);
            assert!(records
                .iter()
                .all(|r| !GameFile::new(r.path.clone(), 0, false).is_package_payload()));
            assert_eq!(
                records.len(),
                files.iter().filter(|f| !f.is_package_payload()).count()
            );
        }
    }
}
