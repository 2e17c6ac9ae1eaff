//! The client loop: owns every open editor and serializes all work on them.
//!
//! # Architecture
//!
//! ```text
//!  editor events ──┐
//!  flush ticks   ──┼──► ClientLoop ──► Reconciler ──► WorkingCopyTracker ──► Transport
//!  inbound msgs  ──┘        │                 └─────► StrategyDispatcher
//!                           └──► ResultRouter (per editor)
//! ```
//!
//! Queue mutation, timer rescheduling and flushing all happen on this one
//! loop. Timers only post ticks back onto it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::auto_save::{AutoSaveMode, DocumentSaver};
use super::debounce::{DEFAULT_QUIET_PERIOD, DebounceScheduler, FlushTick};
use super::dispatcher::StrategyDispatcher;
use super::document::{Document, DocumentChangeEvent};
use super::partition::SinglePartitioner;
use super::reconciler::{FlushReport, Reconciler};
use super::router::{ProjectResolvingState, ResultRouter, RouteOutcome, RouterAction};
use super::tracking::WorkingCopyTracker;
use crate::config::EffectiveSettings;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    DEFAULT_SERVER_ENDPOINT, RECONCILE_STATE_CHANGED, ReconcileResult, ResyncRequest, WORKING_COPY_RESYNC_REQUIRED,
};
use crate::transport::{Envelope, Transport};

const LOG_TARGET: &str = "tandem::client";

/// Knobs of the client loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub quiet_period: Duration,
    pub server_endpoint: String,
    /// Send the full content on the first flush after opening a document.
    pub resync_on_install: bool,
    /// Editor auto-save preference.
    pub auto_save: Option<bool>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            server_endpoint: DEFAULT_SERVER_ENDPOINT.to_string(),
            resync_on_install: false,
            auto_save: None,
        }
    }
}

impl From<&EffectiveSettings> for ClientOptions {
    fn from(settings: &EffectiveSettings) -> Self {
        Self {
            quiet_period: settings.quiet_period,
            server_endpoint: settings.server_endpoint.clone(),
            resync_on_install: settings.resync_on_install,
            auto_save: settings.auto_save,
        }
    }
}

/// Something the host editor reports.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    Open(Document),
    Change {
        location: String,
        event: DocumentChangeEvent,
    },
    Close {
        location: String,
    },
    Move {
        old_location: String,
        new_location: String,
    },
    ResolvingStateChanged(ProjectResolvingState),
}

type DispatcherFactory = Box<dyn Fn(&Document) -> StrategyDispatcher + Send>;
type SaverFactory = Box<dyn Fn(&Document) -> Option<Box<dyn DocumentSaver>> + Send>;

struct OpenEditor {
    document: Document,
    reconciler: Reconciler,
    router: ResultRouter,
    tracker: WorkingCopyTracker,
    auto_save: AutoSaveMode,
}

pub struct ClientLoop {
    transport: Arc<dyn Transport>,
    options: ClientOptions,
    editors: HashMap<String, OpenEditor>,
    scheduler: DebounceScheduler<String>,
    ticks: Option<mpsc::UnboundedReceiver<FlushTick<String>>>,
    dispatcher_factory: DispatcherFactory,
    saver_factory: Option<SaverFactory>,
}

impl ClientLoop {
    pub fn new(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        let (scheduler, ticks) = DebounceScheduler::new(options.quiet_period);
        Self {
            transport,
            options,
            editors: HashMap::new(),
            scheduler,
            ticks: Some(ticks),
            dispatcher_factory: Box::new(|_: &Document| {
                StrategyDispatcher::new(Box::new(SinglePartitioner::default()))
            }),
            saver_factory: None,
        }
    }

    /// Build the partitioner and strategies of each opened document.
    pub fn with_dispatcher_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Document) -> StrategyDispatcher + Send + 'static,
    {
        self.dispatcher_factory = Box::new(factory);
        self
    }

    /// Provide the saver used by auto save.
    pub fn with_saver_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Document) -> Option<Box<dyn DocumentSaver>> + Send + 'static,
    {
        self.saver_factory = Some(Box::new(factory));
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn is_open(&self, location: &str) -> bool {
        self.editors.contains_key(location)
    }

    pub fn document(&self, location: &str) -> Option<&Document> {
        self.editors.get(location).map(|editor| &editor.document)
    }

    pub fn router(&self, location: &str) -> Option<&ResultRouter> {
        self.editors.get(location).map(|editor| &editor.router)
    }

    pub fn auto_save_mut(&mut self, location: &str) -> Option<&mut AutoSaveMode> {
        self.editors.get_mut(location).map(|editor| &mut editor.auto_save)
    }

    pub fn has_pending_flush(&self, location: &str) -> bool {
        self.scheduler.has_pending(&location.to_string())
    }

    /// Start tracking a newly opened document. Returns false if already open.
    pub fn open(&mut self, document: Document) -> bool {
        let location = document.location().to_string();
        if self.editors.contains_key(&location) {
            log::warn!(target: LOG_TARGET, "{} is already open", location);
            return false;
        }

        let router = ResultRouter::new();
        let mut tracker = WorkingCopyTracker::new(
            Arc::clone(&self.transport),
            &self.options.server_endpoint,
            router.instance_id(),
        );
        let mut reconciler = Reconciler::new((self.dispatcher_factory)(&document));
        reconciler.install(&document);

        let mut auto_save = AutoSaveMode::new(self.options.auto_save);
        if let Some(saver) = self.saver_factory.as_ref().and_then(|factory| factory(&document)) {
            auto_save = auto_save.with_saver(saver);
        }

        tracker.start_tracking(&document);
        if self.options.resync_on_install {
            tracker.request_resync();
            self.scheduler.schedule(location.clone());
        }

        log::debug!(target: LOG_TARGET, "Opened {}", location);
        self.editors.insert(
            location,
            OpenEditor {
                document,
                reconciler,
                router,
                tracker,
                auto_save,
            },
        );
        true
    }

    /// Apply an editor change and restart the document's quiet period.
    pub fn change(&mut self, location: &str, event: &DocumentChangeEvent) -> SyncResult<usize> {
        let editor = self
            .editors
            .get_mut(location)
            .ok_or_else(|| SyncError::missing_working_copy(location))?;

        editor.document.apply_change(event)?;
        let queued = editor.reconciler.on_document_change(event);
        self.scheduler.schedule(location.to_string());
        Ok(queued)
    }

    /// Stop tracking. Pending deltas are discarded.
    pub fn close(&mut self, location: &str) -> bool {
        let Some(mut editor) = self.editors.remove(location) else {
            return false;
        };
        self.scheduler.cancel(&location.to_string());
        editor.reconciler.uninstall();
        editor.tracker.stop_tracking(location);
        log::debug!(target: LOG_TARGET, "Closed {}", location);
        true
    }

    /// Re-key an open document after its file moved.
    pub fn move_document(&mut self, old_location: &str, new_location: &str) -> SyncResult<()> {
        if self.editors.contains_key(new_location) {
            return Err(SyncError::protocol(
                "move",
                format!("{} is already open", new_location),
            ));
        }
        let mut editor = self
            .editors
            .remove(old_location)
            .ok_or_else(|| SyncError::missing_working_copy(old_location))?;

        editor.document.set_location(new_location);
        editor.tracker.moved(old_location, &editor.document);
        if self.scheduler.cancel(&old_location.to_string()) {
            self.scheduler.schedule(new_location.to_string());
        }
        self.editors.insert(new_location.to_string(), editor);
        log::debug!(target: LOG_TARGET, "Moved {} to {}", old_location, new_location);
        Ok(())
    }

    /// Flush a document whose quiet period elapsed. Stale ticks are ignored.
    pub fn handle_tick(&mut self, tick: &FlushTick<String>) -> Option<FlushReport> {
        if !self.scheduler.claim(tick) {
            return None;
        }
        self.flush(&tick.key)
    }

    fn flush(&mut self, location: &str) -> Option<FlushReport> {
        let editor = self.editors.get_mut(location)?;
        let report = editor.reconciler.flush(&editor.document, &mut editor.tracker);
        if let Err(e) = editor.auto_save.on_flush(&mut editor.document) {
            log::warn!(target: LOG_TARGET, "Auto save of {} failed: {}", location, e);
        }
        Some(report)
    }

    /// Wait for the next timer tick.
    pub async fn next_tick(&mut self) -> Option<FlushTick<String>> {
        self.ticks.as_mut()?.recv().await
    }

    /// Apply a server message.
    pub fn handle_inbound(&mut self, envelope: Envelope) -> SyncResult<()> {
        match envelope.method.as_str() {
            RECONCILE_STATE_CHANGED => {
                let result: ReconcileResult = envelope.parse()?;
                let mut applied = 0;
                for (location, editor) in self.editors.iter_mut() {
                    if let RouteOutcome::Applied(_) = editor.router.route(location, result.clone()) {
                        applied += 1;
                    }
                }
                if applied == 0 {
                    log::trace!(
                        target: LOG_TARGET,
                        "No open editor accepted result for {}",
                        result.working_copy_owner_id
                    );
                }
                Ok(())
            }
            WORKING_COPY_RESYNC_REQUIRED => {
                let request: ResyncRequest = envelope.parse()?;
                log::info!(
                    target: LOG_TARGET,
                    "Server requested resync of {}: {}",
                    request.file_location,
                    request.reason
                );
                if let Some(editor) = self.editors.get_mut(&request.file_location) {
                    editor.tracker.request_resync();
                    self.scheduler.schedule(request.file_location);
                }
                Ok(())
            }
            other => {
                log::debug!(target: LOG_TARGET, "Ignoring {} from {}", other, envelope.endpoint_id);
                Ok(())
            }
        }
    }

    pub fn on_resolving_state_changed(&mut self, state: ProjectResolvingState) {
        for (location, editor) in self.editors.iter_mut() {
            if editor.router.on_resolving_state_changed(state) == RouterAction::RequestFullReconcile {
                editor.tracker.request_resync();
                self.scheduler.schedule(location.clone());
            }
        }
    }

    pub fn handle_event(&mut self, event: EditorEvent) {
        match event {
            EditorEvent::Open(document) => {
                self.open(document);
            }
            EditorEvent::Change { location, event } => {
                if let Err(e) = self.change(&location, &event) {
                    log::warn!(target: LOG_TARGET, "Dropping change to {}: {}", location, e);
                }
            }
            EditorEvent::Close { location } => {
                self.close(&location);
            }
            EditorEvent::Move {
                old_location,
                new_location,
            } => {
                if let Err(e) = self.move_document(&old_location, &new_location) {
                    log::warn!(target: LOG_TARGET, "Ignoring move of {}: {}", old_location, e);
                }
            }
            EditorEvent::ResolvingStateChanged(state) => self.on_resolving_state_changed(state),
        }
    }

    /// Drive the loop until `cancel` fires or both input channels close.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<EditorEvent>,
        mut inbound: mpsc::UnboundedReceiver<Envelope>,
        cancel: CancellationToken,
    ) {
        let Some(mut ticks) = self.ticks.take() else {
            return;
        };
        let mut events_open = true;
        let mut inbound_open = true;

        while events_open || inbound_open {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(tick) = ticks.recv() => {
                    self.handle_tick(&tick);
                }

                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => events_open = false,
                },

                envelope = inbound.recv(), if inbound_open => match envelope {
                    Some(envelope) => {
                        if let Err(e) = self.handle_inbound(envelope) {
                            log::warn!(target: LOG_TARGET, "Bad server message: {}", e);
                        }
                    }
                    None => inbound_open = false,
                },
            }
        }

        self.scheduler.cancel_all();
        log::debug!(target: LOG_TARGET, "Client loop stopped");
    }
}
