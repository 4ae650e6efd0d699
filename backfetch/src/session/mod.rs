//! Transfer session bookkeeping.
//!
//! The session is the thin layer between catalog intent and the transfer
//! subsystem. It owns the one authoritative map from task handle to catalog
//! index, kept in lockstep with catalog mutation by the coordinator, so
//! event handling never has to scan call sites for the owning item. It does
//! no scheduling of its own: the concurrency limit lives in the subsystem.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::transfer::{TaskHandle, TransferError, TransferSubsystem};

/// Outstanding-transfer bookkeeping over a [`TransferSubsystem`].
pub struct TransferSession<S: TransferSubsystem> {
    subsystem: Arc<S>,
    by_handle: HashMap<TaskHandle, usize>,
}

impl<S: TransferSubsystem> TransferSession<S> {
    pub fn new(subsystem: Arc<S>) -> Self {
        Self {
            subsystem,
            by_handle: HashMap::new(),
        }
    }

    /// Request a transfer for the item at `index`.
    ///
    /// On success the new handle is attached to the index; a
    /// `TaskCreationFailed` error leaves the session untouched and is
    /// retryable by the caller.
    pub fn enqueue(&mut self, index: usize, source_url: &str) -> Result<TaskHandle, TransferError> {
        let handle = self.subsystem.enqueue(source_url)?;
        self.by_handle.insert(handle, index);
        debug!(%handle, index, "transfer attached to catalog item");
        Ok(handle)
    }

    /// The catalog index a handle is attached to, if any.
    pub fn item_for(&self, handle: TaskHandle) -> Option<usize> {
        self.by_handle.get(&handle).copied()
    }

    /// Detach a handle, returning the index it was attached to.
    ///
    /// Called on terminal transitions; later events for the same handle then
    /// resolve to nothing and are treated as stale.
    pub fn detach(&mut self, handle: TaskHandle) -> Option<usize> {
        self.by_handle.remove(&handle)
    }

    /// Number of transfers the session still considers outstanding.
    pub fn outstanding(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// Cancel every outstanding transfer and forget all attachments.
    ///
    /// Fire-and-forget: the subsystem confirms each cancellation with its
    /// own terminal event, which will then resolve to no item here. Used
    /// only by the bulk reset, which rebuilds the catalog anyway.
    pub fn cancel_all(&mut self) {
        self.subsystem.cancel_all();
        self.by_handle.clear();
    }
}
