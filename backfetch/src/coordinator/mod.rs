//! Download coordination.
//!
//! Everything that mutates the catalog runs inside one daemon task
//! ([`DownloadCoordinator`]); collaborators interact through a cloneable
//! [`CoordinatorHandle`] and observe changes through the [`StatusEvent`]
//! feed. See [`daemon`] for the state-machine details.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use backfetch::config::Config;
//! use backfetch::coordinator::DownloadCoordinator;
//! use backfetch::transfer::HttpTransferService;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::new("/var/lib/backfetch".into());
//! let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
//! let transfers = Arc::new(HttpTransferService::new(&config, event_tx));
//!
//! let (daemon, handle, mut status_rx) =
//!     DownloadCoordinator::new(config, transfers, event_rx);
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! handle.start_item(0).await?;
//! while let Some(event) = status_rx.recv().await {
//!     // refresh the UI
//! }
//! ```

mod daemon;
mod error;
mod gate;
mod handle;
mod persist;

pub use daemon::DownloadCoordinator;
pub use error::CoordinatorError;
pub use handle::{CoordinatorHandle, StatusEvent};
