//! Background reconciliation on reconnect.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::network::ConnectivityEvent;

use super::{SyncManager, SyncOutcome};

/// Runs `sync_with_backend` each time the connectivity monitor reports a
/// transition to online. Going offline does nothing.
///
/// The task stops on `shutdown` (after handling transitions already
/// published) or is aborted when the handle is dropped.
pub struct AutoSync {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AutoSync {
    /// Subscribe to `manager`'s connectivity monitor and start listening.
    /// Transitions published after this returns are observed.
    pub fn start(manager: Arc<SyncManager>) -> Self {
        let mut events = manager.connectivity().subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    event = events.recv() => match event {
                        Ok(ConnectivityEvent::BecameOnline) => {
                            info!("Back online, reconciling");
                            log_outcome(manager.sync_with_backend().await);
                        }
                        Ok(ConnectivityEvent::BecameOffline) => {
                            debug!("Went offline, mutations will queue locally");
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed connectivity events");
                            if manager.connectivity().is_online() {
                                log_outcome(manager.sync_with_backend().await);
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut shutdown_rx => break,
                }
            }
            debug!("Auto sync stopped");
        });

        Self {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Stop listening and wait for any in-progress reconciliation.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Auto sync task ended abnormally");
            }
        }
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn log_outcome(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Completed { records } => info!(records, "Reconnect sync complete"),
        SyncOutcome::AlreadySyncing => debug!("Reconnect sync skipped, already syncing"),
        SyncOutcome::Offline => debug!("Reconnect sync skipped, offline again"),
        SyncOutcome::Failed(message) => warn!(%message, "Reconnect sync failed"),
    }
}
