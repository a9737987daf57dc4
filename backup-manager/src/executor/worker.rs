//! The shared background execution context.

use super::state::OperationKind;
use crate::utils::Result;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs one operation at a time off the caller's task.
///
/// Later `begin` calls wait for the current one to finish. Each operation gets
/// its own cancellation token; [`ThreadWorker::cancel`] only affects the
/// operation that is currently running.
#[derive(Clone, Default)]
pub struct ThreadWorker {
    gate: Arc<AsyncMutex<()>>,
    current: Arc<Mutex<Option<(OperationKind, CancellationToken)>>>,
}

impl ThreadWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` on a spawned task once the worker is free.
    ///
    /// The gate stays held by the spawned task, so dropping the returned
    /// future does not let another operation start before this one ends.
    pub async fn begin<F, Fut, T>(&self, kind: OperationKind, work: F) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.gate).lock_owned().await;

        let token = CancellationToken::new();
        self.set_current(Some((kind, token.clone())));
        debug!("Worker started {:?}", kind);

        let active = ActiveOperation {
            kind,
            current: Arc::clone(&self.current),
            _permit: permit,
        };
        let operation = work(token);
        let handle = tokio::spawn(async move {
            let _active = active;
            operation.await
        });

        handle.await?
    }

    /// Cancel the running operation, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let current = self.current.lock().map(|c| (*c).clone()).unwrap_or(None);
        match current {
            Some((kind, token)) => {
                info!("Cancelling {:?} operation", kind);
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Kind of the running operation, if any.
    pub fn running(&self) -> Option<OperationKind> {
        self.current
            .lock()
            .ok()
            .and_then(|c| c.as_ref().map(|(kind, _)| *kind))
    }

    fn set_current(&self, value: Option<(OperationKind, CancellationToken)>) {
        if let Ok(mut current) = self.current.lock() {
            *current = value;
        }
    }
}

/// Owned by the spawned operation; clears the current slot and then frees the
/// gate when the operation ends, panics included.
struct ActiveOperation {
    kind: OperationKind,
    current: Arc<Mutex<Option<(OperationKind, CancellationToken)>>>,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for ActiveOperation {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
        debug!("Worker finished {:?}", self.kind);
    }
}
