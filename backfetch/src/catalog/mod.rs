//! Item catalog.
//!
//! An ordered sequence of downloadable items and their per-item status. The
//! order is presentation-significant (it is the row order) but carries no
//! meaning beyond stable indexing. Lookups by task handle are linear scans,
//! which is fine: the catalog is small and bounded by its template.

mod item;
mod template;

pub use item::{DisplayMetadata, Item, ItemStatus};
pub use template::ItemTemplate;

use crate::transfer::TaskHandle;

/// The ordered set of catalog items.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    /// Populate a fresh catalog from the fixed template.
    ///
    /// Used on first run and on every explicit reset.
    pub fn from_template(templates: &[ItemTemplate]) -> Self {
        Self {
            items: templates.iter().map(ItemTemplate::instantiate).collect(),
        }
    }

    /// Rebuild a catalog from restored items.
    pub(crate) fn from_items(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Item> {
        self.items.get_mut(index)
    }

    /// Find the item a task handle is attached to.
    pub fn find_by_task(&self, handle: TaskHandle) -> Option<&Item> {
        self.items.iter().find(|i| i.task_handle() == Some(handle))
    }

    /// Find the position of the item a task handle is attached to.
    pub fn find_index_by_task(&self, handle: TaskHandle) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.task_handle() == Some(handle))
    }

    /// Reset every item, deleting backing files if requested.
    pub(crate) fn reset_all(&mut self, delete_files: bool) {
        for item in &mut self.items {
            item.reset(delete_files);
        }
    }
}
