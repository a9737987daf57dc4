//! HTTP implementation of the backup API.

use super::BackupApi;
use crate::catalog::Backup;
use crate::config::ApiConfig;
use crate::transfer::progress::{format_bytes, format_speed, TransferProgress};
use crate::transfer::progress_stream::ProgressStream;
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct HttpBackupApi {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpBackupApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("fbkp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = reqwest::Url::parse(&config.base_url).map_err(|e| {
            BackupError::Config(format!("invalid api.base_url {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BackupError::Config(format!(
                "api.base_url cannot be a base URL: {}",
                config.base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// `{base_url}/backups/{game}`, with `game` encoded as a single path segment.
    fn backups_url(&self, game: &str) -> Result<reqwest::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackupError::Config(format!("cannot extend {}", self.base_url)))?
            .pop_if_empty()
            .push("backups")
            .push(game);
        Ok(url)
    }

    async fn fetch_to(&self, url: &str, part_path: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let progress = Mutex::new(TransferProgress::new(response.content_length()));
        let callback = Arc::new(move |bytes: u64| {
            if let Ok(mut p) = progress.lock() {
                p.update(bytes);
                debug!(
                    "Downloaded {} ({})",
                    format_bytes(p.transferred_bytes),
                    format_speed(p.bytes_per_second)
                );
            }
        });

        let mut stream = ProgressStream::new(Box::pin(response.bytes_stream()), callback);
        let mut file = tokio::fs::File::create(part_path).await?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(stream.bytes_transferred())
    }
}

#[async_trait]
impl BackupApi for HttpBackupApi {
    async fn list_backups(&self, game: &str, cancel: &CancellationToken) -> Result<Vec<Backup>> {
        let url = self.backups_url(game)?;
        debug!("Listing backups from {}", url);

        let request = async {
            let response = self.client.get(url.clone()).send().await?.error_for_status()?;
            let backups = response.json::<Vec<Backup>>().await?;
            Ok::<_, BackupError>(backups)
        };

        let backups = tokio::select! {
            result = request => result?,
            _ = cancel.cancelled() => return Err(BackupError::Cancelled),
        };

        info!("Fetched {} remote backups for {}", backups.len(), game);
        Ok(backups)
    }

    async fn download_file(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let part_path = part_path(destination);

        let result = tokio::select! {
            result = self.fetch_to(url, &part_path) => result,
            _ = cancel.cancelled() => Err(BackupError::Cancelled),
        };

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&part_path, destination).await?;
                info!("Downloaded {} to {}", format_bytes(bytes), destination.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }
}

/// Sibling path used while a download is in flight.
fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
