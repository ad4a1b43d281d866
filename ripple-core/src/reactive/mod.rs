//! Reactive Primitives
//!
//! This module implements effects and the primitives built on them: refs,
//! computeds and effect scopes.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a computation that records what it reads while it runs and
//! re-runs when any of it changes. Dependencies are collected afresh on
//! every run, so a branch that is no longer taken stops being a dependency.
//!
//! ## Refs
//!
//! A Ref is a reactive cell for a single value. It is the standalone
//! counterpart of an observed object property.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. Source changes only
//! mark it dirty; the getter runs again on the next read.
//!
//! ## Scopes
//!
//! An Effect Scope collects the effects created inside it so they can be
//! stopped together.
//!
//! # Implementation Notes
//!
//! The running effect lives on a thread-local context stack. A read checks
//! for a running effect and, if tracking is not paused, subscribes it to
//! the dependency set of what was read.

mod computed;
mod context;
mod effect;
mod refs;
mod runtime;
mod scope;
mod subscriber;

pub use computed::{computed, Computed};
pub use context::{enable_tracking, pause_tracking, reset_tracking, untracked, ReactiveContext};
pub use effect::{
    effect, effect_with, stop, EffectOptions, EffectRunner, EffectScheduler, ReactiveEffect,
    SchedulerFn, StopFn,
};
pub use refs::{create_ref, shallow_ref, trigger_ref, Ref, RefValue};
pub use runtime::{track, track_dep, trigger, trigger_dep, Runtime};
pub use scope::{get_current_scope, on_scope_dispose, EffectScope};
pub use subscriber::EffectId;

pub(crate) use subscriber::Subscriber;
