//! Tracks which paths already have an analysis queued.
//!
//! Used to coalesce bursts of deltas into a single reconcile: while a path is
//! in the set, further requests for it are dropped.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::error::LockResultExt;

#[derive(Debug, Clone)]
pub struct InProgressSet<T> {
    items: Arc<Mutex<HashSet<T>>>,
}

impl<T: Eq + Hash + Clone> InProgressSet<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Returns `true` if this call claimed the item.
    pub fn try_start(&self, item: &T) -> bool {
        self.items
            .lock()
            .recover_poison("InProgressSet::try_start")
            .insert(item.clone())
    }

    pub fn finish(&self, item: &T) {
        self.items
            .lock()
            .recover_poison("InProgressSet::finish")
            .remove(item);
    }

    pub fn is_in_progress(&self, item: &T) -> bool {
        self.items
            .lock()
            .recover_poison("InProgressSet::is_in_progress")
            .contains(item)
    }
}

impl<T: Eq + Hash + Clone> Default for InProgressSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
