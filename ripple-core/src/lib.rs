//! Ripple Core
//!
//! This crate provides a fine-grained reactivity engine. It implements:
//!
//! - Observation proxies over plain objects and arrays
//! - Automatic dependency tracking between state and effects
//! - Refs, cached computed values and effect scopes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observe`: raw objects, values and the proxies that observe them
//! - `graph`: the dependency graph linking (target, key) pairs to effects
//! - `reactive`: effects, the tracking context, refs, computeds and scopes
//! - `error`: the error type shared by every fallible operation
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{computed, effect, reactive};
//! use serde_json::json;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! // Create observed state
//! let state = reactive(json!({"count": 1})).into_observed().unwrap();
//!
//! // Create a derived value
//! let source = state.clone();
//! let doubled = computed(move || {
//!     source.get("count").and_then(|count| count.as_f64()).unwrap_or_default() * 2.0
//! });
//!
//! // Create an effect
//! let seen = Arc::new(AtomicI32::new(0));
//! let seen_clone = seen.clone();
//! let _runner = effect(move || seen_clone.store(doubled.get() as i32, Ordering::SeqCst));
//!
//! // Update the state
//! state.set("count", 5);
//! // Effect automatically re-ran
//! assert_eq!(seen.load(Ordering::SeqCst), 10);
//! ```

/// Emit a developer diagnostic. Compiled out without the `dev-warnings`
/// feature.
macro_rules! dev_warn {
    ($($arg:tt)+) => {
        if cfg!(feature = "dev-warnings") {
            ::tracing::warn!($($arg)+);
        }
    };
}

pub mod error;
pub mod graph;
pub mod observe;
pub mod reactive;

pub use error::ReactiveError;
pub use observe::{
    has_changed, is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, try_reactive,
    try_readonly, Key, Observed, ProxyKind, RawObject, TargetId, TargetKind, Value,
    MAX_ARRAY_LENGTH,
};
pub use reactive::{
    computed, create_ref, effect, effect_with, enable_tracking, get_current_scope,
    on_scope_dispose, pause_tracking, reset_tracking, shallow_ref, stop, track, trigger,
    trigger_ref, untracked, Computed, EffectOptions, EffectRunner, EffectScheduler, EffectScope,
    ReactiveEffect, Ref, Runtime,
};
pub use graph::{TrackOp, TriggerOp};
