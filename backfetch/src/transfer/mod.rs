//! Transfer subsystem interface.
//!
//! The transfer subsystem is the collaborator that actually moves bytes. The
//! coordinator never talks HTTP itself; it enqueues transfers through the
//! [`TransferSubsystem`] trait and consumes the discrete [`TransferEvent`]s
//! the subsystem pushes into a channel. This keeps the state machine testable
//! against a scripted mock and keeps transport concerns (TLS, retries at the
//! protocol level, chunking) out of the catalog logic.
//!
//! # Event contract
//!
//! For one task the subsystem emits, in order:
//!
//! ```text
//! Progress*  ──►  Finished (temp location)  ──►  Completed (error: None)
//!       or
//! Progress*  ──►  Completed (error: Some)
//! ```
//!
//! `BatchDrained` is emitted once the subsystem has no outstanding tasks
//! left. All events for a task are delivered before the drain that covers it.

mod http;

pub use http::HttpTransferService;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque identifier for one in-flight transfer.
///
/// Handles are assigned by the subsystem, are never reused for the lifetime
/// of a subsystem instance, and are meaningless across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Create a handle from a raw identifier.
    ///
    /// Only subsystem implementations should mint handles.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Errors reported by a transfer subsystem.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    /// The subsystem could not allocate a new task. Retryable; the item
    /// stays idle and the user may try again.
    #[error("could not create transfer task: {reason}")]
    TaskCreationFailed { reason: String },

    /// The transfer itself failed (connection refused, timeout, bad status).
    #[error("transfer failed: {reason}")]
    Failed { reason: String },

    /// The transfer was cancelled before it finished.
    #[error("transfer cancelled")]
    Cancelled,
}

/// A discrete lifecycle event reported by the transfer subsystem.
#[derive(Debug)]
pub enum TransferEvent {
    /// Bytes arrived for an in-flight task.
    Progress {
        handle: TaskHandle,
        /// Bytes written since the previous progress event.
        bytes_written: u64,
        /// Total bytes written so far.
        total_written: u64,
        /// Total expected bytes, if the server reported a length.
        total_expected: Option<u64>,
    },

    /// A task finished downloading; the payload sits at a temporary
    /// location that the consumer must relocate before the spool is reused.
    Finished {
        handle: TaskHandle,
        temp_location: PathBuf,
    },

    /// A task is done. `error: None` means it finished cleanly (a
    /// `Finished` event preceded this one); `Some` carries the failure.
    Completed {
        handle: TaskHandle,
        error: Option<TransferError>,
    },

    /// The subsystem has no outstanding tasks left.
    BatchDrained,
}

/// Sender half of the subsystem event channel.
pub type TransferEventSender = mpsc::Sender<TransferEvent>;

/// A service that performs background transfers.
///
/// Implementations own the concurrency limit: at most K transfers run at
/// once and excess enqueues queue inside the subsystem, not in the caller.
pub trait TransferSubsystem: Send + Sync + 'static {
    /// Request a new transfer of `source_url`.
    ///
    /// Returns the handle for the new task, or
    /// [`TransferError::TaskCreationFailed`] if the subsystem cannot accept
    /// more work. Must be cheap; the actual byte movement happens in the
    /// background.
    fn enqueue(&self, source_url: &str) -> Result<TaskHandle, TransferError>;

    /// Request cancellation of every outstanding task.
    ///
    /// Best-effort and asynchronous: tasks observe cancellation on their own
    /// schedule and still report a terminal `Completed` event.
    fn cancel_all(&self);

    /// Handles of all tasks the subsystem currently considers outstanding.
    fn outstanding(&self) -> Vec<TaskHandle>;
}
