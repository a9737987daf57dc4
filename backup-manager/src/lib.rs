//! Backup Manager Library
//!
//! Versioned, zstd-compressed backup manifests (`.fbkp`) for asset archives,
//! with a sorted backup catalog and a single-flight orchestrator for creating
//! and downloading backups.

pub mod api;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod manifest;
pub mod provider;
pub mod signal;
pub mod transfer;
pub mod user_log;
pub mod utils;

// Re-export commonly used types
pub use catalog::{Backup, BackupCatalog};
pub use config::Config;
pub use executor::{BackupManager, OperationReport};
pub use manifest::{BackupManifest, BackupRecord, BackupVersion};
pub use utils::errors::{BackupError, ManifestError};
pub type Result<T> = std::result::Result<T, BackupError>;
