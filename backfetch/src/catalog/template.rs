//! Catalog templates.
//!
//! The catalog is populated in bulk from a fixed, ordered template: on first
//! launch, and again on every explicit reset. The template is data handed in
//! by the embedding application; the core never hardcodes sources.

use serde::{Deserialize, Serialize};

use super::item::{DisplayMetadata, Item};

/// Blueprint for one catalog slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Destination file name; doubles as the item's identity.
    pub file_name: String,
    /// Remote location to fetch from.
    pub source_url: String,
    /// Passthrough blob for the presentation layer (title, artist, ...).
    pub metadata: DisplayMetadata,
}

impl ItemTemplate {
    /// Create a template with empty metadata.
    pub fn new(file_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            source_url: source_url.into(),
            metadata: DisplayMetadata::default(),
        }
    }

    /// Attach presentation metadata.
    pub fn with_metadata(mut self, metadata: DisplayMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Instantiate a fresh idle item from this template.
    pub(crate) fn instantiate(&self) -> Item {
        Item::new(
            self.file_name.clone(),
            self.source_url.clone(),
            self.metadata.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemStatus;

    #[test]
    fn test_instantiate_is_idle() {
        let template = ItemTemplate::new("epic.mp3", "http://example.com/epic.mp3");
        let item = template.instantiate();

        assert_eq!(item.file_name(), "epic.mp3");
        assert_eq!(item.source_url(), "http://example.com/epic.mp3");
        assert_eq!(item.status(), ItemStatus::Idle);
    }

    #[test]
    fn test_metadata_passthrough() {
        let metadata = DisplayMetadata(serde_json::json!({
            "title": "Epic",
            "artist": "Bensound",
        }));
        let template =
            ItemTemplate::new("epic.mp3", "http://example.com/epic.mp3").with_metadata(metadata);

        let item = template.instantiate();
        assert_eq!(item.metadata().0["title"], "Epic");
    }
}
