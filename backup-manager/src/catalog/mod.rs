//! In-memory catalog of known backups.
//!
//! The catalog is owned by the interactive thread. Background work never
//! mutates it directly; it posts [`CatalogCommand`]s through a [`Dispatcher`]
//! and the owner applies them. Every mutation is announced as a
//! [`CatalogEvent`] to any number of subscribers.

pub mod dispatcher;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use dispatcher::{channel, CatalogCommand, DispatchQueue, Dispatcher};

/// Maximum number of queued events per subscriber
const EVENT_CAPACITY: usize = 256;

/// Metadata for one backup, local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default)]
    pub game_name: String,

    pub file_name: String,

    /// Present only for remotely sourced backups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    #[serde(default)]
    pub file_size: u64,
}

impl Backup {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            game_name: String::new(),
            file_name: file_name.into(),
            download_url: None,
            file_size: 0,
        }
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn is_remote(&self) -> bool {
        self.download_url.is_some()
    }
}

/// Change notifications emitted by [`BackupCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    Added { index: usize, backup: Backup },
    Replaced { index: usize, backup: Backup },
    Removed { index: usize, backup: Backup },
    SelectionChanged { file_name: Option<String> },
}

/// Backups sorted by file name, unique by file name, with an optional selection.
#[derive(Debug)]
pub struct BackupCatalog {
    entries: Vec<Backup>,
    selected: Option<String>,
    events: broadcast::Sender<CatalogEvent>,
}

impl BackupCatalog {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Vec::new(),
            selected: None,
            events,
        }
    }

    /// Subscribe to change events. Subscribers see only later changes.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backup> {
        self.entries.iter()
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.entries.iter().map(|b| b.file_name.as_str()).collect()
    }

    pub fn get(&self, file_name: &str) -> Option<&Backup> {
        self.position(file_name).ok().map(|i| &self.entries[i])
    }

    pub fn selected(&self) -> Option<&Backup> {
        self.selected.as_deref().and_then(|name| self.get(name))
    }

    /// Insert keeping sort order. An entry with the same file name is replaced.
    pub fn add(&mut self, backup: Backup) {
        match self.position(&backup.file_name) {
            Ok(index) => {
                self.entries[index] = backup.clone();
                self.emit(CatalogEvent::Replaced { index, backup });
            }
            Err(index) => {
                self.entries.insert(index, backup.clone());
                self.emit(CatalogEvent::Added { index, backup });
            }
        }
    }

    /// Remove by file name, clearing the selection if it pointed there.
    pub fn remove(&mut self, file_name: &str) -> Option<Backup> {
        let index = self.position(file_name).ok()?;
        let backup = self.entries.remove(index);
        self.emit(CatalogEvent::Removed {
            index,
            backup: backup.clone(),
        });

        if self.selected.as_deref() == Some(file_name) {
            self.set_selection(None);
        }
        Some(backup)
    }

    /// Select an entry by name. Unknown names clear the selection.
    ///
    /// Returns whether an entry is selected afterwards.
    pub fn select(&mut self, file_name: Option<&str>) -> bool {
        let target = file_name
            .filter(|name| self.position(name).is_ok())
            .map(str::to_string);
        let selected = target.is_some();
        self.set_selection(target);
        selected
    }

    /// Add every backup, then select the last entry in sort order.
    pub fn populate(&mut self, backups: impl IntoIterator<Item = Backup>) {
        for backup in backups {
            self.add(backup);
        }
        let last = self.entries.last().map(|b| b.file_name.clone());
        self.set_selection(last);
    }

    fn position(&self, file_name: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|b| b.file_name.as_str().cmp(file_name))
    }

    fn set_selection(&mut self, file_name: Option<String>) {
        if self.selected != file_name {
            self.selected = file_name.clone();
            self.emit(CatalogEvent::SelectionChanged { file_name });
        }
    }

    fn emit(&self, event: CatalogEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for BackupCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_and_last_selected() {
        let mut catalog = BackupCatalog::new();
        catalog.populate(vec![
            Backup::new("b_1_1_2024.fbkp"),
            Backup::new("a_1_1_2024.fbkp"),
        ]);

        assert_eq!(catalog.file_names(), vec!["a_1_1_2024.fbkp", "b_1_1_2024.fbkp"]);
        assert_eq!(catalog.selected().unwrap().file_name, "b_1_1_2024.fbkp");
    }

    #[test]
    fn test_populate_empty_clears_nothing() {
        let mut catalog = BackupCatalog::new();
        catalog.populate(Vec::new());
        assert!(catalog.is_empty());
        assert!(catalog.selected().is_none());
    }

    #[test]
    fn test_add_keeps_order_and_replaces() {
        let mut catalog = BackupCatalog::new();
        catalog.add(Backup::new("Game_03_01_2024.fbkp"));
        catalog.add(Backup::new("Game_01_15_2024.fbkp"));
        catalog.add(Backup::new("Game_02_10_2024.fbkp"));
        catalog.add(Backup::new("Game_01_15_2024.fbkp").with_download_url("https://x/1"));

        assert_eq!(
            catalog.file_names(),
            vec![
                "Game_01_15_2024.fbkp",
                "Game_02_10_2024.fbkp",
                "Game_03_01_2024.fbkp"
            ]
        );
        assert!(catalog.get("Game_01_15_2024.fbkp").unwrap().is_remote());
    }

    #[test]
    fn test_remove_selected_resets_selection() {
        let mut catalog = BackupCatalog::new();
        catalog.populate(vec![Backup::new("a.fbkp"), Backup::new("b.fbkp")]);
        assert_eq!(catalog.selected().unwrap().file_name, "b.fbkp");

        let removed = catalog.remove("b.fbkp").unwrap();
        assert_eq!(removed.file_name, "b.fbkp");
        assert!(catalog.selected().is_none());
        assert!(catalog.remove("b.fbkp").is_none());
    }

    #[test]
    fn test_select_unknown_clears() {
        let mut catalog = BackupCatalog::new();
        catalog.populate(vec![Backup::new("a.fbkp"), Backup::new("b.fbkp")]);

        assert!(catalog.select(Some("a.fbkp")));
        assert_eq!(catalog.selected().unwrap().file_name, "a.fbkp");

        assert!(!catalog.select(Some("gone.fbkp")));
        assert!(catalog.selected().is_none());
    }

    #[test]
    fn test_events_emitted() {
        let mut catalog = BackupCatalog::new();
        let mut rx = catalog.subscribe();

        catalog.add(Backup::new("b.fbkp"));
        catalog.add(Backup::new("a.fbkp"));
        catalog.select(Some("b.fbkp"));
        catalog.remove("b.fbkp");

        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogEvent::Added { index: 0, backup: Backup::new("b.fbkp") }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogEvent::Added { index: 0, backup: Backup::new("a.fbkp") }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogEvent::SelectionChanged { file_name: Some("b.fbkp".to_string()) }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogEvent::Removed { index: 1, backup: Backup::new("b.fbkp") }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            CatalogEvent::SelectionChanged { file_name: None }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_backup_json_shape() {
        let json = r#"[
            {"gameName": "Game", "fileName": "Game_01_01_2024.fbkp",
             "downloadUrl": "https://example.invalid/Game_01_01_2024.fbkp", "fileSize": 1234},
            {"fileName": "Local.fbkp"}
        ]"#;
        let backups: Vec<Backup> = serde_json::from_str(json).unwrap();

        assert_eq!(backups[0].file_size, 1234);
        assert!(backups[0].is_remote());
        assert!(!backups[1].is_remote());
        assert_eq!(backups[1].game_name, "");
    }
}
