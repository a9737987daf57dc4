//! fbkp - create, list, download and inspect backup manifests.

use anyhow::{bail, Result};
use backup_manager::{
    api::HttpBackupApi,
    catalog::{self, BackupCatalog},
    config::Config,
    executor::BackupManager,
    manifest::BackupManifest,
    provider::DirectoryProvider,
    signal,
    transfer::progress::format_bytes,
    utils,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(name = "fbkp", author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Game identifier (overrides config)
    #[arg(short, long, global = true)]
    game: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Snapshot the archive directory into a new backup
    Create {
        /// Archive directory to enumerate (overrides config)
        #[arg(short, long, value_name = "DIR")]
        archive: Option<PathBuf>,
    },

    /// List remote backups, or local ones with --local
    List {
        #[arg(long)]
        local: bool,
    },

    /// Download a remote backup (defaults to the most recent)
    Download {
        /// File name of the backup to fetch
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Print the contents of a backup manifest
    Inspect {
        path: PathBuf,

        /// Maximum number of records to print
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print the whole manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(game) = args.game {
        config.game.name = game;
    }
    if let Command::Create { archive: Some(dir) } = &args.command {
        config.game.archive_directory = Some(dir.clone());
    }
    config.validate()?;

    // Initialize logging
    let log_level = args.log_level.unwrap_or_else(|| config.log.level.clone());
    utils::logger::init(&log_level)?;
    tracing::debug!("Starting fbkp v{} for {}", env!("CARGO_PKG_VERSION"), config.game.name);

    if let Command::Config = args.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let archive_root = config
        .game
        .archive_directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let api = Arc::new(HttpBackupApi::new(&config.api)?);
    // The backup folder may sit inside the archive root; never back up backups.
    let provider = Arc::new(DirectoryProvider::new(archive_root).exclude(config.backup_folder()));
    let (dispatcher, mut queue) = catalog::channel();
    let manager = BackupManager::new(config, api, provider, dispatcher);

    // This task owns the catalog; background work reaches it only via `queue`.
    let mut catalog = BackupCatalog::new();
    let mut catalog_events = catalog.subscribe();

    let mut feed = manager.user_log().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(entry) => println!("{}", entry),
                Err(RecvError::Lagged(missed)) => tracing::warn!("Skipped {} log entries", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let _signals = signal::cancel_on_signal(manager.worker().clone());

    let success = match args.command {
        Command::Create { .. } => manager.create_backup().await.succeeded(),
        Command::List { local: true } => {
            for backup in manager.list_local_backups().await? {
                catalog.add(backup);
            }
            print_catalog(&catalog);
            true
        }
        Command::List { local: false } => {
            let report = manager.initialize().await;
            queue.drain(&mut catalog);
            print_catalog(&catalog);
            report.succeeded()
        }
        Command::Download { file } => {
            let report = manager.initialize().await;
            queue.drain(&mut catalog);
            if !report.succeeded() {
                false
            } else {
                if let Some(name) = file {
                    if !catalog.select(Some(name.as_str())) {
                        bail!("No remote backup named {}", name);
                    }
                }
                manager.download(catalog.selected()).await?.succeeded()
            }
        }
        Command::Inspect { path, limit, json } => {
            let manifest = manager.inspect(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                print_manifest(&manifest, limit);
            }
            true
        }
        Command::Config => true,
    };

    while let Ok(event) = catalog_events.try_recv() {
        tracing::debug!("Catalog changed: {:?}", event);
    }

    // Closing the log feed lets the printer drain and stop.
    drop(manager);
    let _ = printer.await;

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_catalog(catalog: &BackupCatalog) {
    if catalog.is_empty() {
        println!("No backups found");
        return;
    }

    let selected = catalog.selected().map(|b| b.file_name.as_str());
    for backup in catalog.iter() {
        let marker = if Some(backup.file_name.as_str()) == selected { "*" } else { " " };
        let source = if backup.is_remote() { "remote" } else { "local" };
        println!(
            "{} {:<40} {:>12}  {}",
            marker,
            backup.file_name,
            format_bytes(backup.file_size),
            source
        );
    }
}

fn print_manifest(manifest: &BackupManifest, limit: Option<usize>) {
    println!("Version:   {}", manifest.version);
    println!("Records:   {}", manifest.record_count());
    println!("Encrypted: {}", manifest.encrypted_count());
    println!("Total:     {}", format_bytes(manifest.total_size()));
    println!();

    let limit = limit.unwrap_or(usize::MAX);
    for record in manifest.records.iter().take(limit) {
        let flag = if record.is_encrypted { "E" } else { " " };
        println!("{:>14}  {}  {}", record.size, flag, record.path);
    }
    if manifest.record_count() > limit {
        println!("... {} more", manifest.record_count() - limit);
    }
}
