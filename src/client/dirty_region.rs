//! Pending deltas of one open document.

use std::collections::VecDeque;

use crate::error::{SyncError, SyncResult};
use crate::text::{DeltaKind, EditDelta};

/// A captured edit awaiting the next flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyRegion {
    delta: EditDelta,
}

impl DirtyRegion {
    pub fn new(delta: EditDelta) -> Self {
        Self { delta }
    }

    pub fn delta(&self) -> &EditDelta {
        &self.delta
    }

    pub fn kind(&self) -> DeltaKind {
        self.delta.kind()
    }

    /// Document-relative offset of the edit.
    pub fn offset(&self) -> usize {
        self.delta.offset()
    }

    /// Inserted or removed character count.
    pub fn length(&self) -> usize {
        self.delta.len()
    }

    pub fn text(&self) -> Option<&str> {
        self.delta.text()
    }
}

impl From<EditDelta> for DirtyRegion {
    fn from(delta: EditDelta) -> Self {
        Self::new(delta)
    }
}

/// FIFO of dirty regions.
///
/// Adjacent edits are never merged: each region's offset is only valid
/// against the content produced by the regions queued before it.
#[derive(Debug, Default)]
pub struct DirtyRegionQueue {
    regions: VecDeque<DirtyRegion>,
}

impl DirtyRegionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, region: DirtyRegion) {
        self.regions.push_back(region);
    }

    /// Remove the oldest region. Callers check `len` first.
    pub fn pop(&mut self) -> SyncResult<DirtyRegion> {
        self.regions.pop_front().ok_or(SyncError::EmptyQueue)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Take every pending region in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = DirtyRegion> + '_ {
        self.regions.drain(..)
    }

    /// Drop pending regions without processing them.
    pub fn clear(&mut self) {
        self.regions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_regions_in_push_order() {
        let mut queue = DirtyRegionQueue::new();
        queue.push(EditDelta::insert(0, "a").into());
        queue.push(EditDelta::insert(1, "b").into());
        queue.push(EditDelta::remove(0, 1).into());

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().text(), Some("a"));
        assert_eq!(queue.pop().unwrap().offset(), 1);
        assert_eq!(queue.pop().unwrap().kind(), DeltaKind::Remove);
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_on_empty_queue_fails() {
        let mut queue = DirtyRegionQueue::new();
        assert!(matches!(queue.pop(), Err(SyncError::EmptyQueue)));
    }

    #[test]
    fn adjacent_inserts_are_not_coalesced() {
        let mut queue = DirtyRegionQueue::new();
        queue.push(EditDelta::insert(0, "a").into());
        queue.push(EditDelta::insert(1, "b").into());
        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
