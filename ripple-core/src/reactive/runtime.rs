//! Reactive Runtime
//!
//! `track` and `trigger` connect observed state to effects.
//!
//! # How It Works
//!
//! 1. When an effect reads a key through a proxy, `track` finds (or creates)
//!    the dep for that (target, key) and subscribes the running effect.
//!
//! 2. When a key is written, `trigger` collects every dep the change can
//!    affect, snapshots their members deduplicated by effect id, then
//!    notifies each one.
//!
//! 3. Notification runs synchronously. All affected effects have re-run (or
//!    been handed to their scheduler) by the time `trigger` returns.
//!
//! # Thread Safety
//!
//! The running-effect stack is thread-local. The dependency graph is a
//! process-wide concurrent map, and no graph lock is held while an effect
//! runs.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use super::context::{ActiveEffect, ReactiveContext};
use super::subscriber::{notify, EffectId, Subscriber};
use crate::graph::{self, Dep, TrackOp, TriggerOp};
use crate::observe::{Key, TargetId, Value};

/// Record that the running effect read `key` of `target`.
///
/// A no-op when no effect is running or tracking is paused.
pub fn track(target: TargetId, op: TrackOp, key: Key) {
    let Some(active) = ReactiveContext::tracking_effect() else {
        return;
    };
    trace!(%target, ?op, %key, effect = %active.subscriber.core().id(), "track");
    let dep = graph::dep_for(target, key);
    track_effects(&dep, &active);
}

/// Notify every effect that depends on `key` of `target`.
///
/// `new_value` is needed only for length assignments, where it decides
/// which indices were truncated. `old_value` is accepted for symmetry with
/// the proxy handlers and is not inspected.
pub fn trigger(
    target: TargetId,
    op: TriggerOp,
    key: &Key,
    new_value: Option<&Value>,
    _old_value: Option<&Value>,
) {
    let new_length = new_value.and_then(Value::as_length);
    let deps = graph::deps_for_change(target, op, key, new_length);
    if deps.is_empty() {
        return;
    }
    trace!(%target, ?op, %key, deps = deps.len(), "trigger");
    trigger_effects(deps.iter());
}

/// Subscribe the running effect to a standalone dep.
pub fn track_dep(dep: &Dep) {
    if let Some(active) = ReactiveContext::tracking_effect() {
        track_effects(dep, &active);
    }
}

/// Notify every member of a standalone dep.
pub fn trigger_dep(dep: &Dep) {
    trigger_effects(std::iter::once(dep));
}

pub(crate) fn track_effects(dep: &Dep, active: &ActiveEffect) {
    if dep.subscribe(&active.subscriber, active.epoch) {
        active.subscriber.core().link(dep);
    }
}

pub(crate) fn trigger_effects<'a>(deps: impl IntoIterator<Item = &'a Dep>) {
    let mut effects: IndexMap<EffectId, Arc<dyn Subscriber>> = IndexMap::new();
    for dep in deps {
        dep.collect_into(&mut effects);
    }
    for subscriber in effects.values() {
        notify(subscriber);
    }
}

/// Introspection over the process-wide dependency graph.
pub struct Runtime;

impl Runtime {
    /// Whether any key of `target` has ever been tracked.
    pub fn is_tracked(target: TargetId) -> bool {
        graph::is_tracked(target)
    }

    /// Number of keys of `target` that have a dep.
    pub fn tracked_key_count(target: TargetId) -> usize {
        graph::tracked_key_count(target)
    }

    /// Number of effects subscribed to (target, key).
    pub fn subscriber_count(target: TargetId, key: impl Into<Key>) -> usize {
        graph::subscriber_count(target, &key.into())
    }

    /// The innermost running effect on this thread.
    pub fn current_effect() -> Option<EffectId> {
        ReactiveContext::current_effect()
    }

    /// Whether a read right now would be tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::tracking_effect().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RawObject;
    use crate::reactive::{effect, pause_tracking, reset_tracking};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn track_outside_effect_is_noop() {
        let raw = RawObject::object();
        track(raw.id(), TrackOp::Get, Key::from("foo"));
        assert!(!Runtime::is_tracked(raw.id()));
    }

    #[test]
    fn track_and_trigger_by_hand() {
        let raw = RawObject::object();
        let id = raw.id();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let _runner = effect(move || {
            track(id, TrackOp::Get, Key::from("foo"));
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(Runtime::tracked_key_count(id), 1);
        assert_eq!(Runtime::subscriber_count(id, "foo"), 1);

        trigger(id, TriggerOp::Set, &Key::from("foo"), None, None);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Unrelated keys are silent.
        trigger(id, TriggerOp::Set, &Key::from("bar"), None, None);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn paused_tracking_records_nothing() {
        let raw = RawObject::object();
        let id = raw.id();

        let _runner = effect(move || {
            pause_tracking();
            track(id, TrackOp::Get, Key::from("foo"));
            reset_tracking();
        });

        assert_eq!(Runtime::subscriber_count(id, "foo"), 0);
    }

    #[test]
    fn standalone_dep_roundtrip() {
        let dep = Dep::new();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let tracked = dep.clone();

        let runner = effect(move || {
            track_dep(&tracked);
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(dep.contains(runner.effect().id()));

        trigger_dep(&dep);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        runner.stop();
        assert!(dep.is_empty());
        trigger_dep(&dep);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
