//! Custom error types for the backup manager.

use thiserror::Error;

/// Errors raised while encoding or decoding a backup manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Bad magic: expected 0x504B4246, found {0:#010X}")]
    BadMagic(u32),

    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid record count: {0}")]
    InvalidRecordCount(i32),

    #[error("Too many records for a single manifest: {0}")]
    TooManyRecords(usize),

    #[error("Record {0} has an empty path")]
    EmptyPath(usize),

    #[error("Record {0} has a path that is not valid UTF-8")]
    InvalidPath(usize),

    #[error("Record {0} has a malformed path length prefix")]
    PathTooLong(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest format error: {0}")]
    Format(#[from] ManifestError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backup API error: {0}")]
    Api(String),

    #[error("No backup selected")]
    NoSelection,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid operation transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Background worker error: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for BackupError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            BackupError::Cancelled
        } else {
            BackupError::Worker(err.to_string())
        }
    }
}

impl From<::config::ConfigError> for BackupError {
    fn from(err: ::config::ConfigError) -> Self {
        BackupError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
