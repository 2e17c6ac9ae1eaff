//! Editor-side half: captures changes, debounces them and mirrors them to
//! the server, then routes reconcile results back to the right editor.

pub mod auto_save;
pub mod debounce;
pub mod dirty_region;
pub mod dispatcher;
pub mod document;
pub mod partition;
pub mod reconciler;
pub mod router;
pub mod session;
pub mod tracking;

pub use auto_save::{AutoSaveMode, DocumentSaver};
pub use debounce::{DEFAULT_QUIET_PERIOD, DebounceScheduler, FlushTick};
pub use dirty_region::{DirtyRegion, DirtyRegionQueue};
pub use dispatcher::{DispatchReport, ReconcilingStrategy, StrategyDispatcher};
pub use document::{Document, DocumentChangeEvent};
pub use partition::{ContentType, Partitioner, SinglePartitioner, TypedRegion};
pub use reconciler::{DeltaSink, FlushReport, Reconciler};
pub use router::{
    DisabledReason, ErrorState, ProjectResolvingState, ReconcileState, ResultRouter, RouteOutcome, RouterAction,
};
pub use session::{ClientLoop, ClientOptions, EditorEvent};
pub use tracking::WorkingCopyTracker;
