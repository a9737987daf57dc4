//! Remote backup API.

pub mod http;

use crate::catalog::Backup;
use crate::utils::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub use http::HttpBackupApi;

/// Source of remotely stored backups.
///
/// Both calls should return [`crate::BackupError::Cancelled`] promptly once
/// `cancel` fires.
#[async_trait]
pub trait BackupApi: Send + Sync {
    /// Metadata of every backup published for `game`.
    async fn list_backups(&self, game: &str, cancel: &CancellationToken) -> Result<Vec<Backup>>;

    /// Fetch `url` into `destination`, replacing any existing file.
    async fn download_file(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64>;
}
