//! Catalog entries and their per-download lifecycle.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::transfer::TaskHandle;

/// Lifecycle status of one catalog item.
///
/// `Idle → Downloading → {Completed, Cancelled}`; terminal states return to
/// `Idle` only through an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Not downloaded and no transfer outstanding.
    Idle,
    /// A transfer is outstanding for this item.
    Downloading,
    /// The last attempt ended without a usable file.
    Cancelled,
    /// The file is downloaded and relocated to its destination.
    Completed,
}

/// Display metadata owned entirely by the presentation layer.
///
/// The core never inspects it; it rides along unchanged through persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetadata(pub serde_json::Value);

/// One downloadable entry tracked by the catalog.
///
/// The destination file name is the item's identity: unique within the
/// catalog and immutable for the life of the slot. All status mutation goes
/// through the transition methods so the handle/status invariant
/// (`task_handle.is_some()` exactly while `Downloading`) cannot be broken
/// from outside.
#[derive(Debug, Clone)]
pub struct Item {
    file_name: String,
    source_url: String,
    metadata: DisplayMetadata,
    status: ItemStatus,
    /// Progress in `[0, 1]`; `None` means unknown. Meaningful only while
    /// `Downloading`.
    progress: Option<f32>,
    task_handle: Option<TaskHandle>,
    destination: Option<PathBuf>,
}

impl Item {
    /// Create a fresh idle item.
    pub fn new(
        file_name: impl Into<String>,
        source_url: impl Into<String>,
        metadata: DisplayMetadata,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            source_url: source_url.into(),
            metadata,
            status: ItemStatus::Idle,
            progress: None,
            task_handle: None,
            destination: None,
        }
    }

    /// Rebuild an item from persisted fields.
    ///
    /// Task handles never survive a restart, so restored items carry none;
    /// the store normalizes any persisted `Downloading` status before
    /// calling this.
    pub(crate) fn restore(
        file_name: String,
        source_url: String,
        metadata: DisplayMetadata,
        status: ItemStatus,
        progress: Option<f32>,
        destination: Option<PathBuf>,
    ) -> Self {
        Self {
            file_name,
            source_url,
            metadata,
            status,
            progress,
            task_handle: None,
            destination,
        }
    }

    /// The item's identity: its destination file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Where the file is downloaded from.
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Presentation-owned metadata blob.
    pub fn metadata(&self) -> &DisplayMetadata {
        &self.metadata
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Download progress in `[0, 1]`, or `None` if unknown.
    pub fn progress(&self) -> Option<f32> {
        self.progress
    }

    /// Handle of the outstanding transfer, present exactly while
    /// `Downloading`.
    pub fn task_handle(&self) -> Option<TaskHandle> {
        self.task_handle
    }

    /// Resolved local path, set only once `Completed`.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Attach a transfer and move to `Downloading`.
    pub(crate) fn begin_download(&mut self, handle: TaskHandle) {
        self.status = ItemStatus::Downloading;
        self.task_handle = Some(handle);
        self.progress = None;
    }

    /// Record a progress observation while `Downloading`.
    ///
    /// Clamped to `[0, 1]` and never allowed to regress; ignored in any
    /// other state.
    pub(crate) fn record_progress(&mut self, ratio: f32) {
        if self.status != ItemStatus::Downloading {
            return;
        }
        let floor = self.progress.unwrap_or(0.0);
        self.progress = Some(ratio.clamp(0.0, 1.0).max(floor));
    }

    /// Move to `Completed` with the relocated file at `destination`.
    pub(crate) fn complete(&mut self, destination: PathBuf) {
        self.status = ItemStatus::Completed;
        self.task_handle = None;
        self.progress = None;
        self.destination = Some(destination);
    }

    /// Clear all transient fields and return to `Idle`.
    ///
    /// With `delete_file`, the backing file (if any) is removed best-effort:
    /// deletion failures are logged and swallowed, the slot is reset either
    /// way.
    pub(crate) fn reset(&mut self, delete_file: bool) {
        self.status = ItemStatus::Idle;
        self.task_handle = None;
        self.progress = None;

        if delete_file {
            if let Some(path) = &self.destination {
                if let Err(e) = std::fs::remove_file(path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %e, "failed to delete backing file");
                    }
                }
            }
        }
        self.destination = None;
    }

    /// Reset the slot, then leave it `Cancelled` instead of `Idle`.
    ///
    /// Used when relocation of a finished download fails: the attempt is
    /// over, nothing usable remains, and only an explicit reset may start a
    /// new attempt.
    pub(crate) fn reset_to_cancelled(&mut self) {
        self.reset(true);
        self.status = ItemStatus::Cancelled;
    }

    /// Check the cross-field invariants. Exposed for tests.
    pub fn invariants_hold(&self) -> bool {
        let handle_matches = self.task_handle.is_some() == (self.status == ItemStatus::Downloading);
        let destination_matches =
            self.destination.is_none() || self.status == ItemStatus::Completed;
        let progress_matches = self.progress.is_none() || self.status == ItemStatus::Downloading;
        handle_matches && destination_matches && progress_matches
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:?}] <- {}",
            self.file_name, self.status, self.source_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_item() -> Item {
        Item::new(
            "epic.mp3",
            "http://example.com/epic.mp3",
            DisplayMetadata::default(),
        )
    }

    #[test]
    fn test_new_item_is_idle() {
        let item = test_item();
        assert_eq!(item.status(), ItemStatus::Idle);
        assert_eq!(item.progress(), None);
        assert_eq!(item.task_handle(), None);
        assert_eq!(item.destination(), None);
        assert!(item.invariants_hold());
    }

    #[test]
    fn test_begin_download_attaches_handle() {
        let mut item = test_item();
        item.begin_download(TaskHandle::from_raw(7));

        assert_eq!(item.status(), ItemStatus::Downloading);
        assert_eq!(item.task_handle(), Some(TaskHandle::from_raw(7)));
        assert!(item.invariants_hold());
    }

    #[test]
    fn test_progress_clamped_and_monotonic() {
        let mut item = test_item();
        item.begin_download(TaskHandle::from_raw(1));

        item.record_progress(0.5);
        assert_eq!(item.progress(), Some(0.5));

        // Regressions are ignored.
        item.record_progress(0.25);
        assert_eq!(item.progress(), Some(0.5));

        item.record_progress(1.5);
        assert_eq!(item.progress(), Some(1.0));
    }

    #[test]
    fn test_progress_ignored_when_not_downloading() {
        let mut item = test_item();
        item.record_progress(0.5);
        assert_eq!(item.progress(), None);
    }

    #[test]
    fn test_complete_clears_handle_and_progress() {
        let mut item = test_item();
        item.begin_download(TaskHandle::from_raw(1));
        item.record_progress(0.9);

        item.complete(PathBuf::from("/library/epic.mp3"));

        assert_eq!(item.status(), ItemStatus::Completed);
        assert_eq!(item.task_handle(), None);
        assert_eq!(item.progress(), None);
        assert_eq!(item.destination(), Some(Path::new("/library/epic.mp3")));
        assert!(item.invariants_hold());
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut item = test_item();
        item.begin_download(TaskHandle::from_raw(1));
        item.reset(false);

        assert_eq!(item.status(), ItemStatus::Idle);
        assert_eq!(item.task_handle(), None);
        assert_eq!(item.progress(), None);
        assert!(item.invariants_hold());
    }

    #[test]
    fn test_reset_deletes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epic.mp3");
        std::fs::write(&path, b"audio").unwrap();

        let mut item = test_item();
        item.begin_download(TaskHandle::from_raw(1));
        item.complete(path.clone());

        item.reset(true);

        assert!(!path.exists());
        assert_eq!(item.destination(), None);
        assert!(item.invariants_hold());
    }

    #[test]
    fn test_reset_swallows_missing_file() {
        let mut item = test_item();
        item.begin_download(TaskHandle::from_raw(1));
        item.complete(PathBuf::from("/nonexistent/nowhere.mp3"));

        // Must not panic or propagate.
        item.reset(true);
        assert_eq!(item.status(), ItemStatus::Idle);
    }

    #[test]
    fn test_reset_to_cancelled() {
        let mut item = test_item();
        item.begin_download(TaskHandle::from_raw(1));
        item.reset_to_cancelled();

        assert_eq!(item.status(), ItemStatus::Cancelled);
        assert_eq!(item.task_handle(), None);
        assert!(item.invariants_hold());
    }
}
