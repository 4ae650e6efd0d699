//! Backfetch - background multi-item download management
//!
//! This library tracks a fixed catalog of downloadable items through their
//! lifecycle (`Idle → Downloading → {Completed, Cancelled}`), delegates the
//! byte transfer to a pluggable subsystem, relocates finished artifacts into
//! a library directory, persists catalog state across restarts, and
//! acknowledges platform wake-ups once a background batch has drained.
//!
//! The pieces:
//!
//! - [`catalog`]: the items, their statuses, and the templates they are
//!   built from.
//! - [`transfer`]: the [`transfer::TransferSubsystem`] seam, its event
//!   vocabulary, and the bundled HTTP implementation.
//! - [`session`]: the handle-to-item attachment map.
//! - [`coordinator`]: the daemon that serializes all catalog mutation, plus
//!   the handle and status feed used to drive and observe it.
//! - [`store`]: JSON snapshot persistence with restart normalization.
//! - [`config`]: runtime configuration.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod session;
pub mod store;
pub mod transfer;

pub use catalog::{DisplayMetadata, Item, ItemStatus, ItemTemplate};
pub use config::Config;
pub use coordinator::{CoordinatorError, CoordinatorHandle, DownloadCoordinator, StatusEvent};
pub use transfer::{TaskHandle, TransferError, TransferEvent, TransferSubsystem};
