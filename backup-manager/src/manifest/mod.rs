//! Backup manifest types.
//!
//! A manifest snapshots the files known to an archive provider at one point in
//! time. It is written once per backup and never patched in place.
//!
//! Logical layout (before compression, all integers little-endian):
//!
//! | Offset | Size | Field                                        |
//! |--------|------|----------------------------------------------|
//! | 0      | 4    | magic `0x504B4246` ("FBKP")                  |
//! | 4      | 1    | version                                      |
//! | 5      | 4    | record count (i32)                           |
//! | 9      | ..   | records: size (u64), encrypted (u8), path    |
//!
//! Paths are UTF-8 bytes preceded by their length as a 7-bit encoded integer.
//! The compression transport wraps the whole stream, header included, so the
//! header is only recoverable after decompressing its first bytes.

pub mod codec;
pub mod file;

use crate::utils::ManifestError;
use serde::Serialize;

/// Magic number identifying a backup manifest.
pub const FBKP_MAGIC: u32 = 0x504B_4246;

/// File extension used for backup manifests.
pub const FBKP_EXTENSION: &str = "fbkp";

/// Size of the logical header: magic, version byte and record count.
pub const HEADER_LEN: usize = 9;

/// Manifest format revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum BackupVersion {
    /// Placeholder for files written before the version byte was tracked.
    BeforeVersionWasAdded,
    Initial,
    /// No leading slash on paths; comparisons are case-insensitive.
    PerfectPath,
}

impl BackupVersion {
    /// The only version the writer emits.
    pub const LATEST: BackupVersion = BackupVersion::PerfectPath;

    pub fn from_byte(byte: u8) -> Result<Self, ManifestError> {
        match byte {
            0 => Ok(BackupVersion::BeforeVersionWasAdded),
            1 => Ok(BackupVersion::Initial),
            2 => Ok(BackupVersion::PerfectPath),
            other => Err(ManifestError::UnsupportedVersion(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            BackupVersion::BeforeVersionWasAdded => 0,
            BackupVersion::Initial => 1,
            BackupVersion::PerfectPath => 2,
        }
    }

    /// Whether paths stored under this version are canonicalized.
    pub fn strips_leading_separator(self) -> bool {
        match self {
            BackupVersion::PerfectPath => true,
            BackupVersion::Initial | BackupVersion::BeforeVersionWasAdded => false,
        }
    }
}

impl std::fmt::Display for BackupVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackupVersion::BeforeVersionWasAdded => "before-version-was-added",
            BackupVersion::Initial => "initial",
            BackupVersion::PerfectPath => "perfect-path",
        };
        write!(f, "{} ({})", name, self.as_byte())
    }
}

/// One archived file at backup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    /// Uncompressed size of the source file in bytes
    pub size: u64,

    pub is_encrypted: bool,

    /// Identifying path inside the archive provider
    pub path: String,
}

impl BackupRecord {
    pub fn new(size: u64, is_encrypted: bool, path: impl Into<String>) -> Self {
        Self {
            size,
            is_encrypted,
            path: path.into(),
        }
    }

    /// Path without leading separators, lowercased.
    pub fn canonical_path(&self) -> String {
        canonicalize_path(&self.path)
    }

    /// Case-insensitive comparison against another path, ignoring leading separators.
    pub fn matches_path(&self, other: &str) -> bool {
        self.canonical_path() == canonicalize_path(other)
    }
}

pub fn canonicalize_path(path: &str) -> String {
    path.trim_start_matches('/').to_lowercase()
}

/// Header fields readable without decoding any record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManifestHeader {
    pub magic: u32,
    pub version: BackupVersion,
    pub record_count: usize,
}

/// A decoded manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupManifest {
    pub version: BackupVersion,
    pub records: Vec<BackupRecord>,
}

impl BackupManifest {
    pub fn magic(&self) -> u32 {
        FBKP_MAGIC
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Sum of the uncompressed sizes of every record.
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }

    pub fn encrypted_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_encrypted).count()
    }

    /// Find a record by path, case-insensitively.
    pub fn find(&self, path: &str) -> Option<&BackupRecord> {
        let wanted = canonicalize_path(path);
        self.records.iter().find(|r| r.canonical_path() == wanted)
    }
}
