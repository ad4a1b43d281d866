//! Computed Implementation
//!
//! A [`Computed`] is a derived value that caches its result and only
//! recomputes when a source changes and the value is read again.
//!
//! # How Computeds Work
//!
//! 1. The getter runs inside an effect, so every source it reads subscribes
//!    that effect.
//!
//! 2. The effect has a scheduler instead of re-running on change. When a
//!    source changes, the scheduler marks the computed dirty and notifies
//!    whoever read the computed. Nothing is recomputed yet.
//!
//! 3. The next `get()` sees the dirty flag and runs the getter once. Further
//!    reads return the cached value until a source changes again.
//!
//! # Chaining
//!
//! A computed can read other computeds. Invalidation cascades down the
//! chain as dirty flags; values are recomputed on demand, from the outside
//! in.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::effect::{EffectScheduler, ReactiveEffect};
use super::refs::{track_ref_value, trigger_ref_value};
use crate::graph::Dep;

struct ComputedInner<T> {
    effect: ReactiveEffect<T>,
    value: Mutex<Option<T>>,
    dirty: AtomicBool,
    dep: OnceLock<Dep>,
}

impl<T> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.swap(true, Ordering::SeqCst) {
            trace!(effect = %self.effect.id(), "computed invalidated");
            trigger_ref_value(&self.dep);
        }
    }
}

/// Re-marks the computed dirty if the getter unwinds.
struct DirtyOnUnwind<'a> {
    dirty: &'a AtomicBool,
    done: bool,
}

impl Drop for DirtyOnUnwind<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }
}

/// A cached, lazily recomputed derived value. Clones share the cache.
pub struct Computed<T> {
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + 'static,
{
    /// Create a computed from `getter`. Nothing runs until the first read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scheduler = EffectScheduler::Deferred(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            }));
            ComputedInner {
                effect: ReactiveEffect::build(getter, scheduler, None, None),
                value: Mutex::new(None),
                dirty: AtomicBool::new(true),
                dep: OnceLock::new(),
            }
        });
        Self { inner }
    }

    /// Read the value, recomputing it first if a source changed.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this same computed before it has ever
    /// produced a value. Use [`try_get`](Self::try_get) inside such getters.
    pub fn get(&self) -> T {
        match self.try_get() {
            Some(value) => value,
            None => panic!("computed read itself before producing a value"),
        }
    }

    /// Like [`get`](Self::get), but a re-entrant read from the getter before
    /// its first value returns `None`.
    pub fn try_get(&self) -> Option<T> {
        track_ref_value(&self.inner.dep);

        if self.inner.dirty.swap(false, Ordering::SeqCst) {
            let mut guard = DirtyOnUnwind {
                dirty: &self.inner.dirty,
                done: false,
            };
            // `None` means the getter is already running further up the
            // stack; the cached value stands.
            if let Some(value) = self.inner.effect.run() {
                *self.inner.value.lock() = Some(value);
            }
            guard.done = true;
        }

        self.inner.value.lock().clone()
    }
}

impl<T> Computed<T> {
    /// Whether the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// The effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect<T> {
        &self.inner.effect
    }

    /// Stop reacting to sources. The last cached value is kept.
    pub fn stop(&self) {
        self.inner.effect.stop();
    }

    /// Whether both handles share the same cache.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of effects subscribed to this computed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.get().map_or(0, Dep::len)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.inner.value.lock())
            .field("dirty", &self.is_dirty())
            .field("effect", &self.inner.effect)
            .finish()
    }
}

/// Create a [`Computed`].
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(getter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_ref, effect};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn computed_is_lazy() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let doubled = computed(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            2
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(doubled.is_dirty());

        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.get(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_recomputes_after_source_change() {
        let count = create_ref(1);
        let calls = Arc::new(AtomicI32::new(0));

        let count_clone = count.clone();
        let calls_clone = calls.clone();
        let doubled = computed(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            count_clone.get() * 2
        });

        assert_eq!(doubled.get(), 2);

        count.set(5);
        // Invalidated, not recomputed.
        assert!(doubled.is_dirty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        count.set(6);
        assert_eq!(doubled.get(), 12);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effect_reading_computed_reruns() {
        let count = create_ref(1);
        let count_clone = count.clone();
        let doubled = computed(move || count_clone.get() * 2);

        let seen = Arc::new(AtomicI32::new(0));
        let doubled_clone = doubled.clone();
        let seen_clone = seen.clone();
        let _runner = effect(move || seen_clone.store(doubled_clone.get(), Ordering::SeqCst));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(doubled.subscriber_count(), 1);

        count.set(4);
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn chained_computeds() {
        let count = create_ref(1);
        let count_clone = count.clone();
        let plus_one = computed(move || count_clone.get() + 1);
        let plus_one_clone = plus_one.clone();
        let doubled = computed(move || plus_one_clone.get() * 2);

        assert_eq!(doubled.get(), 4);
        count.set(2);
        assert!(plus_one.is_dirty());
        assert!(doubled.is_dirty());
        assert_eq!(doubled.get(), 6);
    }

    #[test]
    fn stopped_computed_keeps_last_value() {
        let count = create_ref(1);
        let count_clone = count.clone();
        let doubled = computed(move || count_clone.get() * 2);

        assert_eq!(doubled.get(), 2);
        doubled.stop();

        count.set(10);
        assert!(!doubled.is_dirty());
        assert_eq!(doubled.get(), 2);
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn self_read_before_first_value_is_ignored() {
        let slot: Arc<OnceLock<Computed<i32>>> = Arc::new(OnceLock::new());
        let slot_clone = slot.clone();
        let counter = computed(move || {
            let previous = slot_clone.get().and_then(Computed::try_get);
            previous.unwrap_or(0) + 1
        });
        let _ = slot.set(counter.clone());

        assert_eq!(counter.try_get(), Some(1));
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn panicking_getter_stays_dirty() {
        let fail = create_ref(true);
        let fail_clone = fail.clone();
        let value = computed(move || {
            if fail_clone.get() {
                panic!("getter failed");
            }
            1
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| value.get()));
        assert!(result.is_err());
        assert!(value.is_dirty());

        fail.set(false);
        assert_eq!(value.get(), 1);
    }
}
