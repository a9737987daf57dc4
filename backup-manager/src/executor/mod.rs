//! Backup orchestration.
//!
//! [`BackupManager`] drives the create, list and download operations on the
//! shared [`ThreadWorker`], forwards catalog changes through a
//! [`Dispatcher`], and checks every produced file before reporting success.
//! Each operation ends with one developer log line (tracing) and one
//! user-facing [`UserLog`] entry.

pub mod state;
pub mod worker;

use crate::api::BackupApi;
use crate::catalog::{Backup, CatalogCommand, Dispatcher};
use crate::config::Config;
use crate::manifest::{file as manifest_file, BackupManifest, FBKP_EXTENSION};
use crate::provider::{collect_records, ArchiveProvider};
use crate::user_log::{LogLevel, UserLog, UserLogEntry};
use crate::utils::{BackupError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use state::{Operation, OperationKind, OperationState};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use worker::ThreadWorker;

/// Why an operation ended in [`OperationState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum Failure {
    /// An error was raised while running the operation
    Error(String),
    /// The operation completed but left an empty or missing file
    EmptyOutput,
}

/// Outcome of one orchestrated operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub id: Uuid,
    pub kind: OperationKind,
    pub state: OperationState,
    pub file_name: Option<String>,
    pub path: Option<PathBuf>,
    /// Records written (create) or entries fetched (initialize)
    pub count: Option<usize>,
    pub failure: Option<Failure>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OperationReport {
    fn from_operation(op: &Operation) -> Self {
        Self {
            id: op.id,
            kind: op.kind,
            state: op.state(),
            file_name: None,
            path: None,
            count: None,
            failure: None,
            started_at: op.started_at,
            finished_at: op.finished_at,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == OperationState::Succeeded
    }
}

/// `<game>_<MM>_<dd>_<yyyy>.fbkp`
pub fn backup_file_name(game: &str, date: NaiveDate) -> String {
    format!("{}_{}.{}", game, date.format("%m_%d_%Y"), FBKP_EXTENSION)
}

/// A written or downloaded file counts only if it exists and is non-empty.
pub async fn output_is_valid(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.is_file() && metadata.len() > 0,
        Err(_) => false,
    }
}

pub struct BackupManager {
    config: Config,
    api: Arc<dyn BackupApi>,
    provider: Arc<dyn ArchiveProvider>,
    dispatcher: Dispatcher,
    worker: ThreadWorker,
    user_log: UserLog,
}

impl BackupManager {
    pub fn new(
        config: Config,
        api: Arc<dyn BackupApi>,
        provider: Arc<dyn ArchiveProvider>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            api,
            provider,
            dispatcher,
            worker: ThreadWorker::new(),
            user_log: UserLog::new(),
        }
    }

    pub fn worker(&self) -> &ThreadWorker {
        &self.worker
    }

    pub fn user_log(&self) -> &UserLog {
        &self.user_log
    }

    pub fn backup_folder(&self) -> PathBuf {
        self.config.backup_folder()
    }

    /// Fetch remote backup metadata and hand it to the catalog owner, which
    /// sorts it and selects the last entry.
    pub async fn initialize(&self) -> OperationReport {
        let mut op = Operation::new(OperationKind::Initialize);
        start(&mut op);

        let api = Arc::clone(&self.api);
        let game = self.config.game.name.clone();
        let dispatcher = self.dispatcher.clone();

        let result = self
            .worker
            .begin(OperationKind::Initialize, move |cancel| async move {
                let backups = api.list_backups(&game, &cancel).await?;
                let count = backups.len();
                dispatcher.post(CatalogCommand::Populate(backups))?;
                Ok(count)
            })
            .await;

        let game = &self.config.game.name;
        match result {
            Ok(count) => {
                finish(&mut op, true);
                info!("Listed {} backups for {}", count, game);
                let mut report = OperationReport::from_operation(&op);
                report.count = Some(count);
                report
            }
            Err(e) => {
                finish(&mut op, false);
                error!("Could not list backups for {}: {}", game, e);
                self.user_log.append(
                    UserLogEntry::new(LogLevel::Error)
                        .text(format!("Could not list backups for '{}'", game)),
                );
                let mut report = OperationReport::from_operation(&op);
                report.failure = Some(Failure::Error(e.to_string()));
                report
            }
        }
    }

    /// Snapshot the archive provider into `Backups/<game>_<MM>_<dd>_<yyyy>.fbkp`.
    pub async fn create_backup(&self) -> OperationReport {
        self.create_backup_on(chrono::Local::now().date_naive()).await
    }

    /// Same as [`BackupManager::create_backup`] with an explicit date. A backup
    /// created earlier the same day is overwritten.
    ///
    /// Cancellation is honored while enumerating files; once the manifest
    /// write has started it runs to completion.
    pub async fn create_backup_on(&self, date: NaiveDate) -> OperationReport {
        let mut op = Operation::new(OperationKind::Create);
        start(&mut op);

        let folder = self.backup_folder();
        let file_name = backup_file_name(&self.config.game.name, date);
        let path = folder.join(&file_name);

        let provider = Arc::clone(&self.provider);
        let level = self.config.compression.level;
        let target = path.clone();

        let result = self
            .worker
            .begin(OperationKind::Create, move |cancel| async move {
                tokio::task::spawn_blocking(move || -> Result<usize> {
                    std::fs::create_dir_all(&folder)?;

                    let files = provider.files(&cancel)?;
                    let records = collect_records(&files);
                    if cancel.is_cancelled() {
                        return Err(BackupError::Cancelled);
                    }

                    info!(
                        "Writing {} records ({} payload companions skipped) to {}",
                        records.len(),
                        files.len() - records.len(),
                        target.display()
                    );
                    manifest_file::write_manifest_file(&target, &records, level)?;
                    Ok(records.len())
                })
                .await?
            })
            .await;

        let count = result.as_ref().ok().copied();
        let mut report = self
            .save_check(op, file_name.clone(), path.clone(), result.map(|_| ()))
            .await;
        report.count = count;

        if report.succeeded() {
            let file_size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            let backup = Backup {
                game_name: self.config.game.name.clone(),
                file_name,
                download_url: None,
                file_size,
            };
            if let Err(e) = self.dispatcher.post(CatalogCommand::Add(backup)) {
                warn!("Catalog not updated with new backup: {}", e);
            }
        }

        report
    }

    /// Download the selected backup into the backup folder.
    ///
    /// Fails with [`BackupError::NoSelection`] when nothing is selected; every
    /// other problem is reported through the returned report.
    pub async fn download(&self, selected: Option<&Backup>) -> Result<OperationReport> {
        let backup = selected.ok_or(BackupError::NoSelection)?.clone();

        let mut op = Operation::new(OperationKind::Download);
        start(&mut op);

        let folder = self.backup_folder();
        let path = folder.join(&backup.file_name);
        let api = Arc::clone(&self.api);
        let target = path.clone();
        let file_name = backup.file_name.clone();

        let result = self
            .worker
            .begin(OperationKind::Download, move |cancel| async move {
                if !is_plain_file_name(&file_name) {
                    return Err(BackupError::Api(format!("invalid backup file name: {}", file_name)));
                }
                let url = backup.download_url.ok_or_else(|| {
                    BackupError::Api(format!("{} has no download URL", file_name))
                })?;

                tokio::fs::create_dir_all(&folder).await?;
                api.download_file(&url, &target, &cancel).await?;
                Ok(())
            })
            .await;

        let file_name = selected.map(|b| b.file_name.clone()).unwrap_or_default();
        Ok(self.save_check(op, file_name, path, result).await)
    }

    /// Manifests already present in the backup folder, sorted by file name.
    pub async fn list_local_backups(&self) -> Result<Vec<Backup>> {
        let folder = self.backup_folder();
        let mut entries = match tokio::fs::read_dir(&folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension() != Some(OsStr::new(FBKP_EXTENSION)) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            backups.push(Backup {
                game_name: game_from_file_name(&file_name),
                file_name,
                download_url: None,
                file_size: metadata.len(),
            });
        }

        backups.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(backups)
    }

    /// Decode a manifest file for display.
    pub async fn inspect(&self, path: &Path) -> Result<BackupManifest> {
        let path = path.to_path_buf();
        let manifest =
            tokio::task::spawn_blocking(move || manifest_file::read_manifest_file(&path)).await??;
        Ok(manifest)
    }

    /// Integrity check shared by create and download: a nominal success that
    /// left an empty or missing file is still a failure.
    async fn save_check(
        &self,
        mut op: Operation,
        file_name: String,
        path: PathBuf,
        result: Result<()>,
    ) -> OperationReport {
        let kind = op.kind;
        let failure = match result {
            Ok(()) if output_is_valid(&path).await => None,
            Ok(()) => Some(Failure::EmptyOutput),
            Err(e) => Some(Failure::Error(e.to_string())),
        };

        match &failure {
            None => {
                finish(&mut op, true);
                info!("{} successfully {}", file_name, kind.past_tense());
                self.user_log.append(
                    UserLogEntry::new(LogLevel::Information)
                        .text(format!("Successfully {} ", kind.past_tense()))
                        .link(file_name.clone(), path.clone()),
                );
            }
            Some(reason) => {
                finish(&mut op, false);
                match reason {
                    Failure::EmptyOutput => error!(
                        "{} could not be {}: {} is empty or missing",
                        file_name,
                        kind.past_tense(),
                        path.display()
                    ),
                    Failure::Error(message) => {
                        error!("{} could not be {}: {}", file_name, kind.past_tense(), message)
                    }
                }
                self.user_log.append(
                    UserLogEntry::new(LogLevel::Error)
                        .text(format!("Could not {} '{}'", kind.verb(), file_name)),
                );
            }
        }

        let mut report = OperationReport::from_operation(&op);
        report.file_name = Some(file_name);
        report.path = Some(path);
        report.failure = failure;
        report
    }
}

fn start(op: &mut Operation) {
    if let Err(e) = op.start() {
        warn!("Operation {} could not start: {}", op.id, e);
    }
}

fn finish(op: &mut Operation, success: bool) {
    let result = if success { op.succeed() } else { op.fail() };
    if let Err(e) = result {
        warn!("Operation {} could not finish: {}", op.id, e);
    }
}

/// Rejects names that would escape the backup folder.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && Path::new(name).file_name() == Some(OsStr::new(name))
}

fn game_from_file_name(file_name: &str) -> String {
    // Strip `_MM_dd_yyyy.fbkp`; game names may themselves contain underscores.
    let stem = file_name
        .strip_suffix(&format!(".{}", FBKP_EXTENSION))
        .unwrap_or(file_name);
    let parts: Vec<&str> = stem.rsplitn(4, '_').collect();
    match parts.as_slice() {
        [_, _, _, game] => game.to_string(),
        _ => stem.to_string(),
    }
}
