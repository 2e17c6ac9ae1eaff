//! Per-editor reconciler: captures changes, flushes them after the quiet period.

use super::dirty_region::{DirtyRegion, DirtyRegionQueue};
use super::dispatcher::{DispatchReport, StrategyDispatcher};
use super::document::{Document, DocumentChangeEvent};

const LOG_TARGET: &str = "tandem::client";

/// Receives every drained region exactly once, in queue order.
///
/// Kept apart from the strategies so that a region spanning several
/// partitions is still transmitted once.
pub trait DeltaSink {
    fn on_dirty_region(&mut self, document: &Document, region: &DirtyRegion);

    /// Called after a flush. `whole_document` is set when the queue was empty.
    fn on_flush_complete(&mut self, document: &Document, whole_document: bool);
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub regions: usize,
    pub whole_document: bool,
    pub dispatch: DispatchReport,
}

pub struct Reconciler {
    queue: DirtyRegionQueue,
    dispatcher: StrategyDispatcher,
    installed: bool,
}

impl Reconciler {
    pub fn new(dispatcher: StrategyDispatcher) -> Self {
        Self {
            queue: DirtyRegionQueue::new(),
            dispatcher,
            installed: false,
        }
    }

    /// Bind the strategies to `document` and start capturing changes.
    pub fn install(&mut self, document: &Document) {
        self.dispatcher.set_document(document);
        self.installed = true;
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Queue the canonical deltas of an applied change.
    ///
    /// Returns the number of regions queued; zero when not installed.
    pub fn on_document_change(&mut self, event: &DocumentChangeEvent) -> usize {
        if !self.installed {
            return 0;
        }
        let deltas = event.deltas();
        let count = deltas.len();
        for delta in deltas {
            self.queue.push(DirtyRegion::new(delta));
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue through `sink` and the strategies.
    ///
    /// An empty queue reconciles the whole document instead.
    pub fn flush(&mut self, document: &Document, sink: &mut dyn DeltaSink) -> FlushReport {
        let mut report = FlushReport::default();
        if self.queue.is_empty() {
            report.whole_document = true;
            report.dispatch = self.dispatcher.process(document, None);
            sink.on_flush_complete(document, true);
        } else {
            let regions: Vec<DirtyRegion> = self.queue.drain().collect();
            report.regions = regions.len();
            for region in &regions {
                sink.on_dirty_region(document, region);
                report.dispatch.merge(self.dispatcher.process(document, Some(region)));
            }
            sink.on_flush_complete(document, false);
        }

        log::debug!(
            target: LOG_TARGET,
            "Flushed {} ({} regions, whole document: {}, {:?})",
            document.location(),
            report.regions,
            report.whole_document,
            report.dispatch
        );
        report
    }

    /// Stop capturing. Pending regions are discarded, not flushed.
    pub fn uninstall(&mut self) {
        let discarded = self.queue.len();
        self.queue.clear();
        self.dispatcher.close_all();
        self.installed = false;
        if discarded > 0 {
            log::debug!(target: LOG_TARGET, "Discarded {} pending regions on close", discarded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::partition::SinglePartitioner;
    use crate::text::EditDelta;

    #[derive(Default)]
    struct CollectingSink {
        regions: Vec<EditDelta>,
        completions: Vec<bool>,
    }

    impl DeltaSink for CollectingSink {
        fn on_dirty_region(&mut self, _document: &Document, region: &DirtyRegion) {
            self.regions.push(region.delta().clone());
        }

        fn on_flush_complete(&mut self, _document: &Document, whole_document: bool) {
            self.completions.push(whole_document);
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(StrategyDispatcher::new(Box::new(SinglePartitioner::default())))
    }

    #[test]
    fn flush_hands_each_region_to_the_sink_once_in_order() {
        let doc = Document::new("/proj/a.txt", "/proj", "abc");
        let mut reconciler = reconciler();
        reconciler.install(&doc);

        reconciler.on_document_change(&DocumentChangeEvent::insert(1, "XY"));
        reconciler.on_document_change(&DocumentChangeEvent::replace(0, 1, "Z"));
        assert_eq!(reconciler.pending(), 3);

        let mut sink = CollectingSink::default();
        let report = reconciler.flush(&doc, &mut sink);

        assert_eq!(report.regions, 3);
        assert!(!report.whole_document);
        assert_eq!(
            sink.regions,
            vec![
                EditDelta::insert(1, "XY"),
                EditDelta::remove(0, 1),
                EditDelta::insert(0, "Z"),
            ]
        );
        assert_eq!(sink.completions, vec![false]);
        assert_eq!(reconciler.pending(), 0);
    }

    #[test]
    fn empty_flush_reconciles_whole_document() {
        let doc = Document::new("/proj/a.txt", "/proj", "abc");
        let mut reconciler = reconciler();
        reconciler.install(&doc);

        let mut sink = CollectingSink::default();
        let report = reconciler.flush(&doc, &mut sink);
        assert!(report.whole_document);
        assert!(sink.regions.is_empty());
        assert_eq!(sink.completions, vec![true]);
    }

    #[test]
    fn uninstall_discards_pending_regions() {
        let doc = Document::new("/proj/a.txt", "/proj", "abc");
        let mut reconciler = reconciler();
        reconciler.install(&doc);
        reconciler.on_document_change(&DocumentChangeEvent::insert(0, "x"));

        reconciler.uninstall();
        assert_eq!(reconciler.pending(), 0);
        assert_eq!(reconciler.on_document_change(&DocumentChangeEvent::insert(0, "y")), 0);
    }
}
