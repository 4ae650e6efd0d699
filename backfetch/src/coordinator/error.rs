//! Coordinator error types.

use thiserror::Error;

use crate::transfer::TransferError;

/// Errors surfaced to callers of the coordinator handle.
///
/// Subsystem-side failures never escape as errors beyond these: transfer
/// and relocation failures are translated into item-state transitions plus
/// a logged record, and the user sees the item back at `Idle`.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The coordinator task is no longer running.
    #[error("coordinator is not running")]
    Shutdown,

    /// No catalog item exists at the given index.
    #[error("no catalog item at index {0}")]
    UnknownItem(usize),

    /// A start request hit an item that is not idle.
    #[error("item {0} is not idle; downloads restart only after a reset")]
    NotIdle(usize),

    /// The subsystem could not allocate a task. Retryable; the item stayed
    /// idle.
    #[error("could not start download")]
    TaskCreationFailed(#[source] TransferError),
}
