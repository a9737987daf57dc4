//! User-facing log feed.
//!
//! Separate from developer tracing: entries here are short, actionable
//! messages meant for whoever drives the application, and may carry links to
//! files on disk.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Maximum number of queued entries per subscriber
const LOG_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Information,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Text { text: String },
    Link { label: String, target: PathBuf },
}

#[derive(Debug, Clone, Serialize)]
pub struct UserLogEntry {
    pub level: LogLevel,
    pub segments: Vec<Segment>,
    pub timestamp: DateTime<Local>,
}

impl UserLogEntry {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            segments: Vec::new(),
            timestamp: Local::now(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Text { text: text.into() });
        self
    }

    pub fn link(mut self, label: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        self.segments.push(Segment::Link {
            label: label.into(),
            target: target.into(),
        });
        self
    }

    /// The first link target, if any.
    pub fn link_target(&self) -> Option<&PathBuf> {
        self.segments.iter().find_map(|s| match s {
            Segment::Link { target, .. } => Some(target),
            Segment::Text { .. } => None,
        })
    }
}

impl fmt::Display for UserLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text { text } => write!(f, "{}", text)?,
                Segment::Link { label, target } => write!(f, "{} ({})", label, target.display())?,
            }
        }
        Ok(())
    }
}

/// Broadcast feed of [`UserLogEntry`] values.
#[derive(Debug, Clone)]
pub struct UserLog {
    tx: broadcast::Sender<UserLogEntry>,
}

impl UserLog {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LOG_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UserLogEntry> {
        self.tx.subscribe()
    }

    pub fn append(&self, entry: UserLogEntry) {
        // Entries without listeners are dropped.
        let _ = self.tx.send(entry);
    }
}

impl Default for UserLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_rendering() {
        let entry = UserLogEntry::new(LogLevel::Information)
            .text("Successfully created ")
            .link("Game_01_02_2024.fbkp", "/out/Backups/Game_01_02_2024.fbkp");

        assert_eq!(
            entry.to_string(),
            "Successfully created Game_01_02_2024.fbkp (/out/Backups/Game_01_02_2024.fbkp)"
        );
        assert_eq!(
            entry.link_target(),
            Some(&PathBuf::from("/out/Backups/Game_01_02_2024.fbkp"))
        );
    }

    #[test]
    fn test_entry_json() {
        let entry = UserLogEntry::new(LogLevel::Error).text("Could not download 'x.fbkp'");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "error");
        assert_eq!(json["segments"][0]["kind"], "text");
    }

    #[tokio::test]
    async fn test_subscribers_receive_entries() {
        let log = UserLog::new();
        let mut first = log.subscribe();
        let mut second = log.subscribe();

        log.append(UserLogEntry::new(LogLevel::Warning).text("careful"));

        assert_eq!(first.recv().await.unwrap().to_string(), "careful");
        assert_eq!(second.recv().await.unwrap().level, LogLevel::Warning);
    }
}
