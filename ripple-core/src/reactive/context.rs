//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. Reads
//! through a proxy, ref or computed subscribe the innermost running effect
//! to what they read.
//!
//! # Implementation
//!
//! A thread-local stack holds the running effects. Running an effect pushes
//! a frame and returns a guard; dropping the guard pops it, so the previous
//! effect becomes current again even when the effect function panics.
//!
//! Tracking can also be paused independently of the stack. `pause_tracking`,
//! `enable_tracking` and `reset_tracking` form a second stack of saved
//! states. Entering an effect always turns tracking on, and leaving it
//! restores whatever was in force before.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use super::subscriber::{EffectId, Subscriber};

/// The running effect together with the epoch of its current run.
#[derive(Clone)]
pub(crate) struct ActiveEffect {
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) epoch: u64,
}

struct Frame {
    active: ActiveEffect,
    prev_should_track: bool,
}

thread_local! {
    static EFFECT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
    static TRACK_STACK: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the effect panics.
pub struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Make `subscriber` the running effect until the guard is dropped.
    pub(crate) fn enter(subscriber: Arc<dyn Subscriber>, epoch: u64) -> Self {
        let effect_id = subscriber.core().id();
        let prev_should_track = SHOULD_TRACK.with(|flag| flag.replace(true));
        EFFECT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                active: ActiveEffect { subscriber, epoch },
                prev_should_track,
            });
        });
        Self { effect_id }
    }

    /// Check if any effect is running on this thread.
    pub fn is_active() -> bool {
        EFFECT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<EffectId> {
        EFFECT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.active.subscriber.core().id())
        })
    }

    /// Number of nested effect runs.
    pub fn depth() -> usize {
        EFFECT_STACK.with(|stack| stack.borrow().len())
    }

    /// Whether `effect` is anywhere on the stack, i.e. currently running.
    pub fn contains(effect: EffectId) -> bool {
        EFFECT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|frame| frame.active.subscriber.core().id() == effect)
        })
    }

    /// Whether reads are currently being tracked.
    pub fn should_track() -> bool {
        SHOULD_TRACK.with(Cell::get)
    }

    /// The effect reads should subscribe, or `None` when nothing is running
    /// or tracking is paused.
    pub(crate) fn tracking_effect() -> Option<ActiveEffect> {
        if !Self::should_track() {
            return None;
        }
        EFFECT_STACK.with(|stack| stack.borrow().last().map(|frame| frame.active.clone()))
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The frame is dropped outside the borrow: it may hold the last
        // reference to the effect.
        let popped = EFFECT_STACK.with(|stack| stack.borrow_mut().pop());
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.active.subscriber.core().id(),
                self.effect_id,
                "ReactiveContext mismatch"
            );
            SHOULD_TRACK.with(|flag| flag.set(frame.prev_should_track));
        }
    }
}

/// Stop collecting dependencies until the matching [`reset_tracking`].
pub fn pause_tracking() {
    let prev = SHOULD_TRACK.with(|flag| flag.replace(false));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(prev));
}

/// Force dependency collection on until the matching [`reset_tracking`].
pub fn enable_tracking() {
    let prev = SHOULD_TRACK.with(|flag| flag.replace(true));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(prev));
}

/// Restore the tracking state saved by the last pause or enable. With
/// nothing saved, tracking is turned on.
pub fn reset_tracking() {
    let prev = TRACK_STACK.with(|stack| stack.borrow_mut().pop());
    SHOULD_TRACK.with(|flag| flag.set(prev.unwrap_or(true)));
}

struct ResetOnDrop;

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` without subscribing the current effect to anything it reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    pause_tracking();
    let _reset = ResetOnDrop;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_flag_is_a_stack() {
        assert!(ReactiveContext::should_track());

        pause_tracking();
        assert!(!ReactiveContext::should_track());

        enable_tracking();
        assert!(ReactiveContext::should_track());

        reset_tracking();
        assert!(!ReactiveContext::should_track());

        reset_tracking();
        assert!(ReactiveContext::should_track());

        // An unbalanced reset falls back to tracking.
        pause_tracking();
        reset_tracking();
        reset_tracking();
        assert!(ReactiveContext::should_track());
    }

    #[test]
    fn untracked_restores_on_panic() {
        let result = std::panic::catch_unwind(|| {
            untracked(|| {
                assert!(!ReactiveContext::should_track());
                panic!("boom");
            })
        });
        assert!(result.is_err());
        assert!(ReactiveContext::should_track());
    }

    #[test]
    fn no_effect_outside_runs() {
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect().is_none());
        assert_eq!(ReactiveContext::depth(), 0);
        assert!(ReactiveContext::tracking_effect().is_none());
    }
}
