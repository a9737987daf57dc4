//! Configuration management for the backup manager.
//!
//! Loads configuration from a TOML file with `FBKP__SECTION__KEY` environment
//! variable overrides.

use crate::transfer::compression;
use crate::utils::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Subdirectory of the output directory holding backups
pub const BACKUPS_DIR: &str = "Backups";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub game: GameConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Game identifier used in backup names and remote lookups
    pub name: String,

    /// Directory enumerated when creating a backup
    #[serde(default)]
    pub archive_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root output directory; backups live in its `Backups` subdirectory
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Remote backup API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// zstd level (1-22); low values favor speed
    #[serde(default = "default_compression_level")]
    pub level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_output_directory() -> PathBuf {
    PathBuf::from("Output")
}

fn default_base_url() -> String {
    "http://localhost:3000/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_compression_level() -> i32 {
    compression::DEFAULT_LEVEL
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            level: default_compression_level(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            game: GameConfig {
                name: "FortniteGame".to_string(),
                archive_directory: None,
            },
            output: OutputConfig::default(),
            api: ApiConfig::default(),
            compression: CompressionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
            .add_source(::config::Environment::with_prefix("FBKP").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.game.name.trim().is_empty() {
            return Err(BackupError::Config("game.name must not be empty".into()));
        }
        if self.game.name.contains(['/', '\\']) {
            return Err(BackupError::Config(format!(
                "game.name must not contain path separators: {}",
                self.game.name
            )));
        }
        if !(1..=22).contains(&self.compression.level) {
            return Err(BackupError::Config(format!(
                "compression.level must be between 1 and 22, got {}",
                self.compression.level
            )));
        }
        Ok(())
    }

    /// Directory backups are written to and downloaded into
    pub fn backup_folder(&self) -> PathBuf {
        self.output.directory.join(BACKUPS_DIR)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BackupError::Config(e.to_string()))
    }
}
