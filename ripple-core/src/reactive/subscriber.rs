//! Subscriber types for the reactive system.
//!
//! A Subscriber is any computation a Dependency Set can notify. This
//! includes plain effects and the effects backing computed values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::effect::{EffectCore, EffectScheduler};

/// Unique identifier for an effect.
///
/// Dependency sets deduplicate their members by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of the id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// A computation that can sit in a dependency set.
pub(crate) trait Subscriber: Send + Sync {
    /// Bookkeeping shared by every effect: activity, reverse index, scheduler.
    fn core(&self) -> &EffectCore;

    /// Run the computation, discarding its output.
    fn execute(self: Arc<Self>);
}

/// Deliver a change notification: hand it to the scheduler if the effect
/// has one, otherwise re-run the effect now.
pub(crate) fn notify(subscriber: &Arc<dyn Subscriber>) {
    let core = subscriber.core();
    // An earlier notification in the same trigger may have stopped it.
    if !core.is_active() {
        return;
    }
    match core.scheduler() {
        EffectScheduler::Deferred(schedule) => schedule(),
        EffectScheduler::Immediate => Arc::clone(subscriber).execute(),
    }
}
