//! Snapshot writer task.
//!
//! Persistence must never block the event loop, and concurrent writes must
//! not interleave. The coordinator publishes snapshots into a watch channel
//! and this task writes them out one at a time; because a watch channel only
//! retains the latest value, a snapshot published while a write is in flight
//! supersedes any unwritten predecessor instead of queueing behind it.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::{CatalogSnapshot, StateStore};

/// Run the writer until the publishing side is dropped.
///
/// The final snapshot published before the drop is always observed and
/// written, so shutdown persists the latest state.
pub(crate) async fn run_writer(
    store: StateStore,
    mut snapshots: watch::Receiver<Option<CatalogSnapshot>>,
) {
    while snapshots.changed().await.is_ok() {
        let latest = snapshots.borrow_and_update().clone();
        if let Some(snapshot) = latest {
            if let Err(e) = store.save(&snapshot) {
                // Logged only: a lost save means state may not survive a
                // crash, never that the interactive path fails.
                warn!(error = %e, "failed to persist catalog snapshot");
            }
        }
    }
    debug!("snapshot writer stopped");
}
