//! Ref Implementation
//!
//! A [`Ref`] is a reactive cell holding a single value. Reading it inside an
//! effect subscribes the effect; writing a different value notifies every
//! subscriber.
//!
//! # How Refs Work
//!
//! 1. Each ref owns one dependency set, created the first time an effect
//!    reads the ref.
//!
//! 2. Writes are compared against the last raw value written. Writing an
//!    equal value is a no-op.
//!
//! 3. Object payloads are stored twice: the raw object for comparison, and
//!    a reactive view for reads. Nested state read through `get()` is
//!    therefore tracked too. Shallow refs skip the view and store the
//!    payload as given.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{create_ref, effect};
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! let count = create_ref(0);
//! let seen = Arc::new(AtomicI32::new(0));
//!
//! let count_clone = count.clone();
//! let seen_clone = seen.clone();
//! let _runner = effect(move || seen_clone.store(count_clone.get(), Ordering::SeqCst));
//!
//! count.set(5);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::runtime::{track_effects, trigger_dep};
use crate::graph::Dep;
use crate::observe::{self, Value};

/// A type a [`Ref`] can hold.
///
/// Plain data only needs change detection. [`Value`] also wraps object
/// payloads in a reactive view.
pub trait RefValue: Clone + Send + Sync + 'static {
    /// Whether writing `self` over `old` is a change.
    fn has_changed(&self, old: &Self) -> bool;

    /// The view handed out by reads.
    fn to_reactive(self) -> Self {
        self
    }

    /// The form used for change detection.
    fn to_raw(self) -> Self {
        self
    }

    /// Store as-is, without computing a raw form or a view.
    fn is_direct(&self) -> bool {
        true
    }
}

macro_rules! impl_ref_value_eq {
    ($($t:ty),* $(,)?) => {
        $(
            impl RefValue for $t {
                fn has_changed(&self, old: &Self) -> bool {
                    self != old
                }
            }
        )*
    };
}

impl_ref_value_eq!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String,
    &'static str, Arc<str>, (),
);

macro_rules! impl_ref_value_float {
    ($($t:ty),*) => {
        $(
            impl RefValue for $t {
                fn has_changed(&self, old: &Self) -> bool {
                    // NaN never changes into NaN.
                    self != old && !(self.is_nan() && old.is_nan())
                }
            }
        )*
    };
}

impl_ref_value_float!(f32, f64);

impl RefValue for Value {
    fn has_changed(&self, old: &Self) -> bool {
        observe::has_changed(self, old)
    }

    fn to_reactive(self) -> Self {
        observe::to_reactive(self)
    }

    fn to_raw(self) -> Self {
        observe::to_raw(self)
    }

    fn is_direct(&self) -> bool {
        observe::is_shallow(self) || observe::is_readonly(self)
    }
}

impl<T: RefValue> RefValue for Option<T> {
    fn has_changed(&self, old: &Self) -> bool {
        match (self, old) {
            (Some(new), Some(old)) => new.has_changed(old),
            (None, None) => false,
            _ => true,
        }
    }

    fn to_reactive(self) -> Self {
        self.map(RefValue::to_reactive)
    }

    fn to_raw(self) -> Self {
        self.map(RefValue::to_raw)
    }

    fn is_direct(&self) -> bool {
        self.as_ref().map_or(true, RefValue::is_direct)
    }
}

struct RefState<T> {
    value: T,
    raw: T,
}

struct RefInner<T> {
    state: Mutex<RefState<T>>,
    dep: OnceLock<Dep>,
    shallow: bool,
}

/// A reactive cell. Clones share the same cell.
pub struct Ref<T> {
    inner: Arc<RefInner<T>>,
}

impl<T: RefValue> Ref<T> {
    /// Create a deep ref. Object payloads are read through a reactive view.
    pub fn new(value: T) -> Self {
        Self::create(value, false)
    }

    /// A ref that stores its payload as given. Only replacing the whole
    /// value notifies.
    pub fn new_shallow(value: T) -> Self {
        Self::create(value, true)
    }

    fn create(value: T, shallow: bool) -> Self {
        let state = if shallow {
            RefState {
                value: value.clone(),
                raw: value,
            }
        } else {
            RefState {
                raw: value.clone().to_raw(),
                value: value.to_reactive(),
            }
        };
        Self {
            inner: Arc::new(RefInner {
                state: Mutex::new(state),
                dep: OnceLock::new(),
                shallow,
            }),
        }
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> T {
        track_ref_value(&self.inner.dep);
        self.get_untracked()
    }

    /// Read the value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Write the value. Notifies subscribers only if it changed.
    pub fn set(&self, value: T) {
        let direct = self.inner.shallow || value.is_direct();
        let (raw, view) = if direct {
            (value.clone(), value)
        } else {
            let raw = value.to_raw();
            (raw.clone(), raw.to_reactive())
        };

        {
            let mut state = self.inner.state.lock();
            if !raw.has_changed(&state.raw) {
                return;
            }
            state.raw = raw;
            state.value = view;
        }
        trigger_ref_value(&self.inner.dep);
    }

    /// Write the result of `f` applied to the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.get_untracked());
        self.set(next);
    }
}

impl<T> Ref<T> {
    /// Whether the payload is stored as given.
    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Whether both handles share the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of effects subscribed to this ref.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.get().map_or(0, Dep::len)
    }

    fn notify(&self) {
        trigger_ref_value(&self.inner.dep);
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RefValue> From<T> for Ref<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &self.inner.state.lock().value)
            .field("shallow", &self.inner.shallow)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Create a [`Ref`].
pub fn create_ref<T: RefValue>(value: T) -> Ref<T> {
    Ref::new(value)
}

/// Create a shallow [`Ref`].
pub fn shallow_ref<T: RefValue>(value: T) -> Ref<T> {
    Ref::new_shallow(value)
}

/// Notify a ref's subscribers without changing it. Useful after mutating
/// the inside of a shallow ref's payload.
pub fn trigger_ref<T>(target: &Ref<T>) {
    target.notify();
}

/// Subscribe the running effect to a lazily created dep.
pub(crate) fn track_ref_value(dep: &OnceLock<Dep>) {
    if let Some(active) = ReactiveContext::tracking_effect() {
        track_effects(dep.get_or_init(Dep::new), &active);
    }
}

pub(crate) fn trigger_ref_value(dep: &OnceLock<Dep>) {
    if let Some(dep) = dep.get() {
        trigger_dep(dep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{is_reactive, reactive};
    use crate::reactive::effect;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn ref_notifies_on_change_only() {
        let count = create_ref(1);
        let runs = Arc::new(AtomicI32::new(0));

        let count_clone = count.clone();
        let runs_clone = runs.clone();
        let _runner = effect(move || {
            count_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.subscriber_count(), 1);

        count.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        count.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        count.update(|n| n + 1);
        assert_eq!(count.get_untracked(), 3);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn nan_is_not_a_change() {
        let value = create_ref(f64::NAN);
        let runs = Arc::new(AtomicI32::new(0));

        let value_clone = value.clone();
        let runs_clone = runs.clone();
        let _runner = effect(move || {
            value_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        value.set(f64::NAN);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn object_payload_is_reactive() {
        let state = create_ref(Value::from(json!({"count": 1})));
        assert!(is_reactive(&state.get_untracked()));

        let seen = Arc::new(AtomicI32::new(0));
        let state_clone = state.clone();
        let seen_clone = seen.clone();
        let _runner = effect(move || {
            let count = state_clone
                .get()
                .as_observed()
                .and_then(|observed| observed.get("count"))
                .and_then(|count| count.as_f64())
                .unwrap_or_default();
            seen_clone.store(count as i32, Ordering::SeqCst);
        });

        if let Some(observed) = state.get_untracked().as_observed() {
            observed.set("count", 7);
        }
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn setting_the_proxy_of_the_raw_value_is_no_change() {
        let raw = Value::from(json!({"a": 1}));
        let state = create_ref(raw.clone());
        let runs = Arc::new(AtomicI32::new(0));

        let state_clone = state.clone();
        let runs_clone = runs.clone();
        let _runner = effect(move || {
            state_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set(reactive(raw));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shallow_ref_stores_payload_as_given() {
        let raw = Value::from(json!({"count": 1}));
        let state = shallow_ref(raw.clone());
        assert!(state.is_shallow());
        assert_eq!(state.get_untracked(), raw);

        let runs = Arc::new(AtomicI32::new(0));
        let state_clone = state.clone();
        let runs_clone = runs.clone();
        let _runner = effect(move || {
            state_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Mutating the payload in place goes unnoticed until forced.
        if let Some(object) = raw.as_object() {
            let _ = object.insert("count", 2);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        trigger_ref(&state);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn from_ref_is_identity() {
        let a = create_ref(String::from("hi"));
        let b: Ref<String> = Ref::from(a.clone());
        assert!(a.ptr_eq(&b));

        let c: Ref<String> = Ref::from(String::from("hi"));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let count = create_ref(0);
        let count_clone = count.clone();
        let _runner = effect(move || count_clone.get_untracked());
        assert_eq!(count.subscriber_count(), 0);
    }
}
