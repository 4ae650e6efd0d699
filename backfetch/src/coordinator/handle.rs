//! Command surface of the coordinator.
//!
//! Collaborators never touch the catalog directly: they hold a cloneable
//! [`CoordinatorHandle`] and send commands into the single coordination
//! context, which replies over oneshot channels. This replaces the
//! process-wide mutable singleton of similar designs with one constructed
//! instance passed to whoever needs it.

use tokio::sync::{mpsc, oneshot};

use super::error::CoordinatorError;
use super::gate::BatchAck;
use crate::catalog::Item;
use crate::transfer::TaskHandle;

/// Status notifications pushed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The item at `index` changed status or progress; refresh its row.
    Changed { index: usize },

    /// A batch of background transfers drained. Carries the first item that
    /// reached `Completed` during the batch, ready to present.
    BatchFinished { first_completed: Option<usize> },

    /// Task creation failed for a start request; the item stayed idle and
    /// the user should be offered a retry.
    StartFailed { index: usize },
}

/// Commands accepted by the coordinator.
pub(crate) enum Command {
    Start {
        index: usize,
        reply: oneshot::Sender<Result<TaskHandle, CoordinatorError>>,
    },
    ResetAll {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Item>>,
    },
    Persist,
    BackgroundWake {
        ack: BatchAck,
    },
}

/// Cloneable handle for driving the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    /// Start downloading the item at `index`.
    ///
    /// Valid only for idle items. A `TaskCreationFailed` error is retryable;
    /// the item is still idle.
    pub async fn start_item(&self, index: usize) -> Result<TaskHandle, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Start { index, reply })
            .await
            .map_err(|_| CoordinatorError::Shutdown)?;
        rx.await.map_err(|_| CoordinatorError::Shutdown)?
    }

    /// Cancel all outstanding transfers and reset the catalog to its
    /// template, deleting downloaded files.
    pub async fn reset_all(&self) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ResetAll { reply })
            .await
            .map_err(|_| CoordinatorError::Shutdown)?;
        rx.await.map_err(|_| CoordinatorError::Shutdown)
    }

    /// A read-only copy of the current catalog, taken after all mutation
    /// queued ahead of this call has been applied.
    pub async fn snapshot(&self) -> Result<Vec<Item>, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| CoordinatorError::Shutdown)?;
        rx.await.map_err(|_| CoordinatorError::Shutdown)
    }

    /// Opportunistically persist the catalog (e.g. when the host process is
    /// about to be suspended).
    pub async fn persist(&self) -> Result<(), CoordinatorError> {
        self.commands
            .send(Command::Persist)
            .await
            .map_err(|_| CoordinatorError::Shutdown)
    }

    /// Tell the coordinator the process was woken to finish pending
    /// transfers.
    ///
    /// The returned receiver resolves exactly once, after the batch drains
    /// and the resulting state refresh has been applied; the host then
    /// acknowledges the wake-up to the platform.
    pub async fn background_wake(&self) -> Result<oneshot::Receiver<()>, CoordinatorError> {
        let (ack, rx) = oneshot::channel();
        self.commands
            .send(Command::BackgroundWake { ack })
            .await
            .map_err(|_| CoordinatorError::Shutdown)?;
        Ok(rx)
    }
}
