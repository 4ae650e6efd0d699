//! Download coordinator daemon.
//!
//! The coordinator is the single coordination context of the crate: user
//! intent (commands) and subsystem events funnel into one `tokio::select!`
//! loop, so every catalog mutation and state-machine transition is applied
//! serially. Presentation reads are snapshot copies taken through the same
//! loop, after queued mutation has been applied.
//!
//! # Architecture
//!
//! ```text
//! CoordinatorHandle ──commands──► ┌────────────────────────┐
//!                                 │  DownloadCoordinator   │──► StatusEvent feed
//! TransferSubsystem ──events────► │  (catalog + session +  │
//!                                 │   completion gate)     │──► snapshot watch ──► writer task
//!                                 └────────────────────────┘
//! ```
//!
//! Per-item transitions are `Idle → Downloading → {Completed, Cancelled}`,
//! with terminal states returning to `Idle` only through an explicit reset.
//! Events whose task handle no longer maps to an item are logged and
//! dropped; a late terminal event can never resurrect an item.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::CoordinatorError;
use super::gate::CompletionGate;
use super::handle::{Command, CoordinatorHandle, StatusEvent};
use super::persist;
use crate::catalog::{Catalog, ItemStatus};
use crate::config::Config;
use crate::session::TransferSession;
use crate::store::{CatalogSnapshot, StateStore};
use crate::transfer::{TaskHandle, TransferError, TransferEvent, TransferSubsystem};

/// The download coordinator daemon.
///
/// Owns the catalog and the transfer session; runs as a long-lived task.
pub struct DownloadCoordinator<S: TransferSubsystem> {
    state: CoordinatorState<S>,
    command_rx: mpsc::Receiver<Command>,
    event_rx: mpsc::Receiver<TransferEvent>,
    store: StateStore,
    snapshot_rx: watch::Receiver<Option<CatalogSnapshot>>,
}

impl<S: TransferSubsystem> DownloadCoordinator<S> {
    /// Create the coordinator, restoring the catalog from the last snapshot
    /// if one exists (falling back to the template otherwise).
    ///
    /// Returns the daemon, the command handle, and the status feed for the
    /// presentation layer. `event_rx` is the receiving end of the channel
    /// the transfer subsystem reports into.
    pub fn new(
        config: Config,
        subsystem: Arc<S>,
        event_rx: mpsc::Receiver<TransferEvent>,
    ) -> (
        Self,
        CoordinatorHandle,
        mpsc::UnboundedReceiver<StatusEvent>,
    ) {
        let store = StateStore::new(config.snapshot_path.clone());
        let catalog = match store.load() {
            Some(catalog) => {
                info!(items = catalog.len(), "catalog restored from snapshot");
                catalog
            }
            None => {
                info!(items = config.templates.len(), "initializing catalog from template");
                Catalog::from_template(&config.templates)
            }
        };

        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(None);

        let daemon = Self {
            state: CoordinatorState {
                catalog,
                session: TransferSession::new(subsystem),
                config,
                status_tx,
                snapshot_tx,
                gate: CompletionGate::new(),
            },
            command_rx,
            event_rx,
            store,
            snapshot_rx,
        };

        (daemon, CoordinatorHandle::new(command_tx), status_rx)
    }

    /// Run the daemon until shutdown is signalled or both input channels
    /// close.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("download coordinator starting");

        let Self {
            mut state,
            mut command_rx,
            mut event_rx,
            store,
            snapshot_rx,
        } = self;

        let writer = tokio::spawn(persist::run_writer(store, snapshot_rx));

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("download coordinator shutting down");
                    break;
                }

                // Events drain ahead of commands, so a snapshot request
                // observes every subsystem event delivered before it.
                Some(event) = event_rx.recv() => {
                    state.handle_event(event).await;
                }

                Some(command) = command_rx.recv() => {
                    state.handle_command(command);
                }

                else => break,
            }
        }

        // Persist the latest state, then let the writer drain and stop.
        state.push_snapshot();
        drop(state);
        let _ = writer.await;
        info!("download coordinator stopped");
    }
}

/// Mutable state behind the daemon loop.
struct CoordinatorState<S: TransferSubsystem> {
    catalog: Catalog,
    session: TransferSession<S>,
    config: Config,
    status_tx: mpsc::UnboundedSender<StatusEvent>,
    snapshot_tx: watch::Sender<Option<CatalogSnapshot>>,
    gate: CompletionGate,
}

impl<S: TransferSubsystem> CoordinatorState<S> {
    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { index, reply } => {
                let _ = reply.send(self.start_item(index));
            }
            Command::ResetAll { reply } => {
                self.reset_all();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.catalog.items().to_vec());
            }
            Command::Persist => self.push_snapshot(),
            Command::BackgroundWake { ack } => self.gate.arm(ack),
        }
    }

    async fn handle_event(&mut self, event: TransferEvent) {
        match event {
            TransferEvent::Progress {
                handle,
                total_written,
                total_expected,
                ..
            } => self.on_progress(handle, total_written, total_expected),
            TransferEvent::Finished {
                handle,
                temp_location,
            } => self.on_finished(handle, temp_location).await,
            TransferEvent::Completed { handle, error } => self.on_completed(handle, error),
            TransferEvent::BatchDrained => self.on_batch_drained(),
        }
    }

    /// `Idle → Downloading`, valid only for idle items.
    fn start_item(&mut self, index: usize) -> Result<TaskHandle, CoordinatorError> {
        let item = self
            .catalog
            .get(index)
            .ok_or(CoordinatorError::UnknownItem(index))?;

        if item.status() != ItemStatus::Idle {
            debug!(index, status = ?item.status(), "ignoring start request for non-idle item");
            return Err(CoordinatorError::NotIdle(index));
        }

        let source_url = item.source_url().to_string();
        match self.session.enqueue(index, &source_url) {
            Ok(handle) => {
                if let Some(item) = self.catalog.get_mut(index) {
                    item.begin_download(handle);
                }
                info!(index, %handle, url = %source_url, "download started");
                self.notify(StatusEvent::Changed { index });
                Ok(handle)
            }
            Err(e) => {
                // Retryable: the item stays idle and the user is prompted.
                warn!(index, error = %e, "failed to create download task");
                self.notify(StatusEvent::StartFailed { index });
                Err(CoordinatorError::TaskCreationFailed(e))
            }
        }
    }

    fn on_progress(&mut self, handle: TaskHandle, total_written: u64, total_expected: Option<u64>) {
        let Some(index) = self.session.item_for(handle) else {
            debug!(%handle, "progress event for unknown task; dropping");
            return;
        };
        let Some(item) = self.catalog.get_mut(index) else {
            warn!(%handle, index, "task attached to a missing catalog slot");
            return;
        };

        // With no usable expected total the progress stays unknown.
        if let Some(total) = total_expected.filter(|t| *t > 0) {
            item.record_progress(total_written as f32 / total as f32);
        }
        self.notify(StatusEvent::Changed { index });
    }

    /// `Downloading → Completed`, or `→ Cancelled` if relocation fails.
    async fn on_finished(&mut self, handle: TaskHandle, temp_location: PathBuf) {
        let Some(index) = self.session.detach(handle) else {
            debug!(%handle, "finished event for unknown task; discarding artifact");
            tokio::fs::remove_file(&temp_location).await.ok();
            return;
        };
        let Some(file_name) = self.catalog.get(index).map(|i| i.file_name().to_string()) else {
            warn!(%handle, index, "task attached to a missing catalog slot");
            return;
        };

        let destination = self.config.library_dir.join(file_name);
        match relocate(&temp_location, &destination).await {
            Ok(()) => {
                if let Some(item) = self.catalog.get_mut(index) {
                    item.complete(destination);
                }
                info!(index, %handle, "download completed");
                self.gate.record_completed(index);
            }
            Err(e) => {
                // Relocation failure ends the attempt; nothing usable
                // remains, so the slot goes to Cancelled until a reset.
                error!(index, %handle, error = %e, "failed to relocate finished download");
                tokio::fs::remove_file(&temp_location).await.ok();
                if let Some(item) = self.catalog.get_mut(index) {
                    item.reset_to_cancelled();
                }
            }
        }

        self.notify(StatusEvent::Changed { index });
        self.push_snapshot();
    }

    /// `Downloading → Idle` on a transfer error. A clean completion is a
    /// no-op here: the `Finished` event already drove the terminal
    /// transition and detached the handle.
    fn on_completed(&mut self, handle: TaskHandle, error: Option<TransferError>) {
        let Some(err) = error else {
            debug!(%handle, "task completed cleanly");
            return;
        };

        let Some(index) = self.session.detach(handle) else {
            debug!(%handle, error = %err, "error event for unknown task; dropping");
            return;
        };

        warn!(index, %handle, error = %err, "transfer failed; resetting item");
        if let Some(item) = self.catalog.get_mut(index) {
            item.reset(true);
        }
        self.notify(StatusEvent::Changed { index });
        self.push_snapshot();
    }

    fn on_batch_drained(&mut self) {
        if !self.session.is_empty() {
            debug!(
                outstanding = self.session.outstanding(),
                "drain signal with transfers still outstanding; ignoring"
            );
            return;
        }

        let first_completed = self.gate.take_first_completed();
        self.notify(StatusEvent::BatchFinished { first_completed });
        self.push_snapshot();
        // Fired only after the state refresh above; no-op when unarmed.
        self.gate.fire();
    }

    /// Cancel everything and rebuild the catalog from its template.
    fn reset_all(&mut self) {
        info!("resetting all downloads");

        // Fire-and-forget; late cancel events resolve to no item and drop.
        self.session.cancel_all();

        self.catalog.reset_all(true);
        self.catalog = Catalog::from_template(&self.config.templates);

        for index in 0..self.catalog.len() {
            self.notify(StatusEvent::Changed { index });
        }
        self.push_snapshot();
    }

    /// Publish the current catalog to the snapshot writer.
    fn push_snapshot(&self) {
        let snapshot = CatalogSnapshot::capture(&self.catalog);
        if self.snapshot_tx.send(Some(snapshot)).is_err() {
            warn!("snapshot writer has stopped; catalog state will not be persisted");
        }
    }

    fn notify(&self, event: StatusEvent) {
        // The presentation layer may be gone; that is not our problem.
        let _ = self.status_tx.send(event);
    }
}

#[derive(Debug, Error)]
#[error("could not move {from} to {to}: {source}")]
struct RelocateError {
    from: String,
    to: String,
    #[source]
    source: io::Error,
}

/// Atomically move a finished artifact to its catalog-owned destination,
/// replacing any prior file there.
///
/// Rename first; spool and library may sit on different filesystems, in
/// which case the fallback is copy-then-remove.
async fn relocate(from: &Path, to: &Path) -> Result<(), RelocateError> {
    fn wrap(from: &Path, to: &Path, source: io::Error) -> RelocateError {
        RelocateError {
            from: from.display().to_string(),
            to: to.display().to_string(),
            source,
        }
    }

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| wrap(from, to, e))?;
    }

    tokio::fs::remove_file(to).await.ok();

    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    if let Err(e) = tokio::fs::copy(from, to).await {
        tokio::fs::remove_file(to).await.ok();
        return Err(wrap(from, to, e));
    }
    tokio::fs::remove_file(from).await.ok();
    Ok(())
}
