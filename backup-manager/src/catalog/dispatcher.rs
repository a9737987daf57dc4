//! Handoff of catalog mutations from background tasks to the catalog owner.

use super::{Backup, BackupCatalog};
use crate::utils::{BackupError, Result};
use tokio::sync::mpsc;

/// A mutation to apply on the thread that owns the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCommand {
    /// Add every backup, then select the last by sort order
    Populate(Vec<Backup>),
    Add(Backup),
    Remove(String),
    Select(Option<String>),
}

impl CatalogCommand {
    pub fn apply(self, catalog: &mut BackupCatalog) {
        match self {
            CatalogCommand::Populate(backups) => catalog.populate(backups),
            CatalogCommand::Add(backup) => catalog.add(backup),
            CatalogCommand::Remove(file_name) => {
                catalog.remove(&file_name);
            }
            CatalogCommand::Select(file_name) => {
                catalog.select(file_name.as_deref());
            }
        }
    }
}

/// Sending half, safe to clone into background tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<CatalogCommand>,
}

impl Dispatcher {
    pub fn post(&self, command: CatalogCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| BackupError::Worker("catalog owner has shut down".to_string()))
    }
}

/// Receiving half, kept by the catalog owner.
#[derive(Debug)]
pub struct DispatchQueue {
    rx: mpsc::UnboundedReceiver<CatalogCommand>,
}

impl DispatchQueue {
    /// Apply every pending command without waiting. Returns how many ran.
    pub fn drain(&mut self, catalog: &mut BackupCatalog) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.rx.try_recv() {
            command.apply(catalog);
            applied += 1;
        }
        applied
    }

    /// Wait for the next command and apply it. Returns `false` once every
    /// dispatcher is gone.
    pub async fn next(&mut self, catalog: &mut BackupCatalog) -> bool {
        match self.rx.recv().await {
            Some(command) => {
                command.apply(catalog);
                true
            }
            None => false,
        }
    }
}

pub fn channel() -> (Dispatcher, DispatchQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { tx }, DispatchQueue { rx })
}
