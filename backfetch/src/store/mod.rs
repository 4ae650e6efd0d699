//! Durable catalog persistence.
//!
//! The store writes the whole ordered catalog as one versioned JSON record.
//! Snapshots are written opportunistically (suspend) and on every terminal
//! transition, and read once at process start. An unreadable or corrupt
//! snapshot degrades to "no snapshot": the caller falls back to the template
//! and the bad file is discarded, never propagated.
//!
//! Records deliberately hold item fields only. Task handles are runtime
//! state of a transfer session that no longer exists after a restart, so
//! they are never written, and any item persisted mid-download is restored
//! as `Idle`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{Catalog, DisplayMetadata, Item, ItemStatus};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur while persisting the catalog.
///
/// These are logged by the caller, never surfaced to the interactive path:
/// a failed save only means state may not survive the next crash.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to serialize or write the snapshot.
    #[error("failed to persist snapshot to {path}: {source}")]
    PersistenceFailed { path: PathBuf, source: io::Error },

    /// The snapshot on disk could not be understood.
    #[error("corrupt snapshot at {path}: {reason}")]
    SnapshotCorrupt { path: PathBuf, reason: String },
}

/// Persisted form of one catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub file_name: String,
    pub source_url: String,
    pub metadata: DisplayMetadata,
    pub status: ItemStatus,
    pub progress: Option<f32>,
    pub destination: Option<PathBuf>,
}

impl ItemRecord {
    fn capture(item: &Item) -> Self {
        Self {
            file_name: item.file_name().to_string(),
            source_url: item.source_url().to_string(),
            metadata: item.metadata().clone(),
            status: item.status(),
            progress: item.progress(),
            destination: item.destination().map(Path::to_path_buf),
        }
    }

    /// Rebuild the live item, normalizing state that cannot survive a
    /// restart: a `Downloading` record comes back `Idle` with no progress,
    /// and a destination is honored only on `Completed` records.
    fn restore(self) -> Item {
        let (status, progress) = match self.status {
            ItemStatus::Downloading => (ItemStatus::Idle, None),
            other => (other, None),
        };
        let destination = if status == ItemStatus::Completed {
            self.destination
        } else {
            None
        };

        Item::restore(
            self.file_name,
            self.source_url,
            self.metadata,
            status,
            progress,
            destination,
        )
    }
}

/// A point-in-time serialized copy of the full catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub items: Vec<ItemRecord>,
}

impl CatalogSnapshot {
    /// Capture the current catalog.
    pub fn capture(catalog: &Catalog) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            items: catalog.items().iter().map(ItemRecord::capture).collect(),
        }
    }

    /// Rebuild the catalog from this snapshot.
    pub fn restore(self) -> Catalog {
        Catalog::from_items(self.items.into_iter().map(ItemRecord::restore).collect())
    }
}

/// Reads and writes catalog snapshots at a fixed path.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot`, replacing any prior one.
    ///
    /// Writes to a sibling temp file and renames over the target so a crash
    /// mid-write never leaves a torn snapshot behind.
    pub fn save(&self, snapshot: &CatalogSnapshot) -> Result<(), StoreError> {
        let data =
            serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::PersistenceFailed {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::PersistenceFailed {
                path: self.path.clone(),
                source: e,
            })?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &data).map_err(|e| StoreError::PersistenceFailed {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::PersistenceFailed {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), items = snapshot.items.len(), "catalog snapshot saved");
        Ok(())
    }

    /// Load the previously saved catalog.
    ///
    /// Returns `None` if no snapshot exists or it cannot be read; a corrupt
    /// snapshot is logged and deleted so the next run starts clean.
    pub fn load(&self) -> Option<Catalog> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no catalog snapshot found");
            return None;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read catalog snapshot");
                return None;
            }
        };

        let snapshot: CatalogSnapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding corrupt catalog snapshot");
                fs::remove_file(&self.path).ok();
                return None;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                path = %self.path.display(),
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "discarding catalog snapshot with unsupported version"
            );
            fs::remove_file(&self.path).ok();
            return None;
        }

        Some(snapshot.restore())
    }
}
