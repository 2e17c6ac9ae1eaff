//! Analysis run over working copy content.

use crate::error::SyncResult;
use crate::protocol::{HighlightedPosition, Problem};

/// What one reconcile produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub problems: Vec<Problem>,
    pub highlighted_positions: Vec<HighlightedPosition>,
}

/// Computes diagnostics and highlighting for a file's current content.
///
/// Called from a blocking thread; implementations may take their time.
pub trait ReconciliationEngine: Send + Sync {
    fn reconcile(&self, path: &str, content: &str) -> SyncResult<Analysis>;
}

/// Reports nothing. Keeps mirroring useful without an analyzer attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEngine;

impl ReconciliationEngine for NoopEngine {
    fn reconcile(&self, _path: &str, _content: &str) -> SyncResult<Analysis> {
        Ok(Analysis::default())
    }
}

impl<F> ReconciliationEngine for F
where
    F: Fn(&str, &str) -> SyncResult<Analysis> + Send + Sync,
{
    fn reconcile(&self, path: &str, content: &str) -> SyncResult<Analysis> {
        self(path, content)
    }
}
