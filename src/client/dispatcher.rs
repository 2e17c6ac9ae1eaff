//! Content-type routing of dirty regions to reconciling strategies.

use std::collections::HashMap;

use super::dirty_region::DirtyRegion;
use super::document::Document;
use super::partition::{ContentType, Partitioner, TypedRegion};
use crate::error::SyncResult;

const LOG_TARGET: &str = "tandem::dispatch";

/// Reacts to changes inside partitions of one content type.
pub trait ReconcilingStrategy: Send {
    /// Called once when the strategy is bound to a document.
    fn set_document(&mut self, document: &Document);

    /// Incremental step: `dirty` was captured inside `sub_region`.
    fn reconcile_dirty(&mut self, document: &Document, dirty: &DirtyRegion, sub_region: &TypedRegion) -> SyncResult<()>;

    /// Whole-partition step.
    fn reconcile(&mut self, document: &Document, partition: &TypedRegion) -> SyncResult<()>;

    /// Called when the owning editor closes.
    fn close(&mut self) {}
}

/// Counts from one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.dispatched += other.dispatched;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Routes each partition of a dirty range to the strategy of its type.
pub struct StrategyDispatcher {
    partitioner: Box<dyn Partitioner>,
    strategies: HashMap<ContentType, Box<dyn ReconcilingStrategy>>,
}

impl StrategyDispatcher {
    pub fn new(partitioner: Box<dyn Partitioner>) -> Self {
        Self {
            partitioner,
            strategies: HashMap::new(),
        }
    }

    /// Register `strategy` for `content_type`, replacing any previous one.
    pub fn add_strategy(&mut self, content_type: ContentType, strategy: Box<dyn ReconcilingStrategy>) {
        self.strategies.insert(content_type, strategy);
    }

    pub fn has_strategy(&self, content_type: &ContentType) -> bool {
        self.strategies.contains_key(content_type)
    }

    pub fn set_document(&mut self, document: &Document) {
        for strategy in self.strategies.values_mut() {
            strategy.set_document(document);
        }
    }

    /// Dispatch one dirty region, or the whole document when `dirty` is `None`.
    ///
    /// A partition whose type has no strategy is skipped. A failing strategy is
    /// logged and dispatch continues with the next partition.
    pub fn process(&mut self, document: &Document, dirty: Option<&DirtyRegion>) -> DispatchReport {
        let document_length = document.char_len();
        let (offset, length) = match dirty {
            Some(region) => {
                let start = region.offset().min(document_length);
                let end = region.offset().saturating_add(region.length()).min(document_length);
                (start, end - start)
            }
            None => (0, document_length),
        };

        let mut report = DispatchReport::default();
        for sub_region in self.partitioner.compute_partitioning(document, offset, length) {
            let Some(strategy) = self.strategies.get_mut(&sub_region.content_type) else {
                log::trace!(
                    target: LOG_TARGET,
                    "No strategy for {} at {}..{}",
                    sub_region.content_type,
                    sub_region.offset,
                    sub_region.end()
                );
                report.skipped += 1;
                continue;
            };

            let outcome = match dirty {
                Some(region) => strategy.reconcile_dirty(document, region, &sub_region),
                None => strategy.reconcile(document, &sub_region),
            };
            match outcome {
                Ok(()) => report.dispatched += 1,
                Err(e) => {
                    log::warn!(
                        target: LOG_TARGET,
                        "Strategy for {} failed on {}: {}",
                        sub_region.content_type,
                        document.location(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub fn close_all(&mut self) {
        for strategy in self.strategies.values_mut() {
            strategy.close();
        }
    }
}
