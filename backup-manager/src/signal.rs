//! Ctrl+C / SIGTERM handling for the CLI.
//!
//! A signal cancels the operation currently running on the worker; the
//! operation itself decides how quickly it can stop.

use crate::executor::worker::ThreadWorker;
use tokio::signal;
use tracing::{info, warn};

/// Wait for SIGINT or SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Cancel the worker's current operation whenever a signal arrives. With
/// nothing running, the process exits.
pub fn cancel_on_signal(worker: ThreadWorker) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            wait_for_signal().await;
            if !worker.cancel() {
                info!("No operation running, exiting");
                std::process::exit(130);
            }
        }
    })
}
