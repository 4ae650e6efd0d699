//! Configuration for the download manager.

use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::ItemTemplate;

/// Default snapshot file name inside the library directory.
pub const SNAPSHOT_FILENAME: &str = "backfetch_catalog.json";

/// Configuration for the download coordinator and the bundled transfer
/// service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed, ordered catalog template used on first run and on reset.
    pub templates: Vec<ItemTemplate>,

    /// Directory where completed downloads live.
    pub library_dir: PathBuf,

    /// Directory for in-flight spool files.
    pub spool_dir: PathBuf,

    /// Path of the durable catalog snapshot.
    pub snapshot_path: PathBuf,

    /// Maximum concurrent active transfers; excess enqueues queue inside
    /// the transfer subsystem.
    pub max_concurrent_transfers: usize,

    /// HTTP request timeout for the bundled transfer service.
    pub transfer_timeout: Duration,

    /// Capacity of the coordinator command channel.
    pub command_capacity: usize,

    /// Capacity of the subsystem event channel.
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        let library_dir = PathBuf::from(".");
        Self {
            templates: Vec::new(),
            snapshot_path: library_dir.join(SNAPSHOT_FILENAME),
            library_dir,
            spool_dir: std::env::temp_dir().join("backfetch-spool"),
            max_concurrent_transfers: 2,
            transfer_timeout: Duration::from_secs(300),
            command_capacity: 64,
            event_capacity: 256,
        }
    }
}

impl Config {
    /// Create a configuration rooted at `library_dir`.
    ///
    /// The snapshot lives inside the library directory by default.
    pub fn new(library_dir: PathBuf) -> Self {
        Self {
            snapshot_path: library_dir.join(SNAPSHOT_FILENAME),
            library_dir,
            ..Default::default()
        }
    }

    /// Set the catalog template.
    pub fn with_templates(mut self, templates: Vec<ItemTemplate>) -> Self {
        self.templates = templates;
        self
    }

    /// Set the spool directory.
    pub fn with_spool_dir(mut self, path: PathBuf) -> Self {
        self.spool_dir = path;
        self
    }

    /// Set the snapshot path.
    pub fn with_snapshot_path(mut self, path: PathBuf) -> Self {
        self.snapshot_path = path;
        self
    }

    /// Set the concurrent transfer limit.
    pub fn with_max_concurrent_transfers(mut self, max: usize) -> Self {
        self.max_concurrent_transfers = max;
        self
    }

    /// Set the transfer timeout.
    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }
}
