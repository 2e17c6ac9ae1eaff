//! Per-document debounce timers.
//!
//! Every change to an open document restarts that document's timer. When a
//! timer survives a full quiet period it posts a [`FlushTick`] onto the client
//! loop's channel; the loop then drains the document's dirty region queue.
//!
//! # Architecture
//!
//! ```text
//! document change
//!       │
//!       ▼
//! schedule(key)
//!       │
//!       ├─► Abort previous timer task (if any)
//!       │
//!       └─► Spawn timer task (generation n)
//!               │
//!               ├─► Sleep quiet period
//!               │
//!               └─► Send FlushTick { key, generation: n }
//!                       │
//!                       ▼
//!               client loop: claim(tick) ──► flush only if n is still current
//! ```
//!
//! The timer never touches document state itself. A tick that was already in
//! the channel when a newer change rescheduled the timer carries an old
//! generation and is rejected by [`DebounceScheduler::claim`], so at most one
//! flush runs per quiet period and never re-entrantly.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Default quiet period before pending deltas are flushed.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

const LOG_TARGET: &str = "tandem::debounce";

/// Posted by an expired timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushTick<K> {
    pub key: K,
    pub generation: u64,
}

struct PendingTimer {
    generation: u64,
    handle: AbortHandle,
}

/// Cancellable, reschedule-on-event delayed tasks keyed by document.
pub struct DebounceScheduler<K> {
    timers: HashMap<K, PendingTimer>,
    quiet_period: Duration,
    ticks: mpsc::UnboundedSender<FlushTick<K>>,
    next_generation: u64,
}

impl<K> DebounceScheduler<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
{
    /// Create a scheduler and the receiver its ticks arrive on.
    pub fn new(quiet_period: Duration) -> (Self, mpsc::UnboundedReceiver<FlushTick<K>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: HashMap::new(),
                quiet_period,
                ticks: tx,
                next_generation: 0,
            },
            rx,
        )
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Cancel any pending timer for `key` and start a fresh one.
    ///
    /// Returns the generation the new timer's tick will carry.
    pub fn schedule(&mut self, key: K) -> u64 {
        // Drop entries whose tick was posted but never claimed (document closed).
        const CLEANUP_THRESHOLD: usize = 32;
        if self.timers.len() > CLEANUP_THRESHOLD {
            self.timers.retain(|_, timer| !timer.handle.is_finished());
        }

        if let Some(previous) = self.timers.remove(&key) {
            previous.handle.abort();
            log::trace!(target: LOG_TARGET, "Rescheduled timer for {:?}", key);
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let quiet_period = self.quiet_period;
        let ticks = self.ticks.clone();
        let tick = FlushTick {
            key: key.clone(),
            generation,
        };

        let task = tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            // The loop may already be gone during shutdown.
            let _ = ticks.send(tick);
        });

        self.timers.insert(
            key,
            PendingTimer {
                generation,
                handle: task.abort_handle(),
            },
        );
        generation
    }

    /// Accept a tick if it belongs to the live timer of its key.
    ///
    /// A claimed timer is forgotten; a stale tick is ignored.
    pub fn claim(&mut self, tick: &FlushTick<K>) -> bool {
        match self.timers.get(&tick.key) {
            Some(timer) if timer.generation == tick.generation => {
                self.timers.remove(&tick.key);
                true
            }
            _ => {
                log::trace!(
                    target: LOG_TARGET,
                    "Ignoring stale tick {} for {:?}",
                    tick.generation,
                    tick.key
                );
                false
            }
        }
    }

    /// Cancel the timer of a closed document.
    pub fn cancel(&mut self, key: &K) -> bool {
        if let Some(timer) = self.timers.remove(key) {
            timer.handle.abort();
            log::trace!(target: LOG_TARGET, "Cancelled timer for {:?}", key);
            true
        } else {
            false
        }
    }

    /// Cancel every timer. Called on shutdown.
    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
        log::debug!(target: LOG_TARGET, "Cancelled all debounce timers");
    }

    pub fn has_pending(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }
}

impl<K> Drop for DebounceScheduler<K> {
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.handle.abort();
        }
    }
}
