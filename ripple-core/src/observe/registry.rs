//! Proxy Registry
//!
//! One map per [`ProxyKind`] from raw target id to its proxy. Entries hold
//! the proxy weakly: the registry never keeps a proxy (or its target) alive,
//! and a dropped proxy removes its own entry.
//!
//! The entry points here are the public wrapping API (`reactive`,
//! `readonly`, ...) and the introspection predicates.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use tracing::debug;

use super::object::TargetId;
use super::proxy::{Observed, ProxyInner, ProxyKind};
use super::value::Value;
use crate::error::ReactiveError;

type ProxyMap = DashMap<TargetId, Weak<ProxyInner>>;

static REACTIVE_MAP: OnceLock<ProxyMap> = OnceLock::new();
static SHALLOW_REACTIVE_MAP: OnceLock<ProxyMap> = OnceLock::new();
static READONLY_MAP: OnceLock<ProxyMap> = OnceLock::new();
static SHALLOW_READONLY_MAP: OnceLock<ProxyMap> = OnceLock::new();

fn proxy_map(kind: ProxyKind) -> &'static ProxyMap {
    let cell = match kind {
        ProxyKind::Reactive => &REACTIVE_MAP,
        ProxyKind::ShallowReactive => &SHALLOW_REACTIVE_MAP,
        ProxyKind::Readonly => &READONLY_MAP,
        ProxyKind::ShallowReadonly => &SHALLOW_READONLY_MAP,
    };
    cell.get_or_init(DashMap::new)
}

/// Called when a proxy is dropped. A newer live proxy for the same target
/// keeps its entry.
pub(crate) fn forget_proxy(kind: ProxyKind, target: TargetId) {
    proxy_map(kind).remove_if(&target, |_, proxy| proxy.strong_count() == 0);
}

/// Number of live proxies of `kind`.
pub fn proxy_count(kind: ProxyKind) -> usize {
    proxy_map(kind)
        .iter()
        .filter(|entry| entry.value().strong_count() > 0)
        .count()
}

fn create_reactive_object(target: &Value, kind: ProxyKind) -> Result<Observed, ReactiveError> {
    let raw = match target {
        // A readonly view of a mutable proxy wraps the raw target directly, so
        // reads are never intercepted twice. Every other re-wrap is a no-op.
        Value::Proxy(existing) => {
            if existing.kind() == kind || !(kind.is_readonly() && existing.is_reactive()) {
                return Ok(existing.clone());
            }
            existing.raw().clone()
        }
        Value::Object(raw) => raw.clone(),
        other => {
            return Err(ReactiveError::InvalidTarget {
                type_name: other.type_name(),
            })
        }
    };

    let map = proxy_map(kind);
    if let Some(existing) = map.get(&raw.id()).and_then(|entry| entry.upgrade()) {
        return Ok(Observed::from_inner(existing));
    }

    if raw.is_marked_raw() {
        return Err(ReactiveError::MarkedRaw(raw.id()));
    }
    if !raw.is_extensible() {
        return Err(ReactiveError::NotExtensible(raw.id()));
    }

    let id = raw.id();
    let inner = Arc::new(ProxyInner { raw, kind });
    map.insert(id, Arc::downgrade(&inner));
    debug!(target_id = %id, ?kind, "created proxy");
    Ok(Observed::from_inner(inner))
}

fn wrap_or_unchanged(target: Value, kind: ProxyKind) -> Value {
    match create_reactive_object(&target, kind) {
        Ok(observed) => Value::Proxy(observed),
        Err(err) => {
            if matches!(err, ReactiveError::InvalidTarget { .. }) {
                dev_warn!("{err}");
            }
            target
        }
    }
}

/// Wrap an object or array in a mutable proxy.
///
/// Returns the input unchanged when it is not an object, is already
/// readonly, is marked raw, or is not extensible.
pub fn reactive(target: impl Into<Value>) -> Value {
    let target = target.into();
    if is_readonly(&target) {
        return target;
    }
    wrap_or_unchanged(target, ProxyKind::Reactive)
}

/// Like [`reactive`], but nested objects are returned as-is.
pub fn shallow_reactive(target: impl Into<Value>) -> Value {
    wrap_or_unchanged(target.into(), ProxyKind::ShallowReactive)
}

/// Wrap an object or array in a readonly proxy. Writes are rejected and
/// reads are never tracked.
pub fn readonly(target: impl Into<Value>) -> Value {
    wrap_or_unchanged(target.into(), ProxyKind::Readonly)
}

/// Like [`readonly`], but nested objects are returned as-is.
pub fn shallow_readonly(target: impl Into<Value>) -> Value {
    wrap_or_unchanged(target.into(), ProxyKind::ShallowReadonly)
}

/// Fallible [`reactive`]: reports why the target could not be wrapped.
pub fn try_reactive(target: impl Into<Value>) -> Result<Observed, ReactiveError> {
    let target = target.into();
    if let Value::Proxy(existing) = &target {
        if existing.is_readonly() {
            return Ok(existing.clone());
        }
    }
    create_reactive_object(&target, ProxyKind::Reactive)
}

/// Fallible [`readonly`].
pub fn try_readonly(target: impl Into<Value>) -> Result<Observed, ReactiveError> {
    create_reactive_object(&target.into(), ProxyKind::Readonly)
}

/// `true` for mutable proxies.
pub fn is_reactive(value: &Value) -> bool {
    value.as_observed().is_some_and(Observed::is_reactive)
}

/// Whether `value` is a readonly proxy.
pub fn is_readonly(value: &Value) -> bool {
    value.as_observed().is_some_and(Observed::is_readonly)
}

/// Whether `value` is a shallow proxy.
pub fn is_shallow(value: &Value) -> bool {
    value.as_observed().is_some_and(Observed::is_shallow)
}

/// Whether `value` is any proxy.
pub fn is_proxy(value: &Value) -> bool {
    value.as_observed().is_some()
}

/// Unwrap a proxy to its raw target. Anything else is returned unchanged.
pub fn to_raw(value: Value) -> Value {
    match value {
        Value::Proxy(observed) => Value::Object(observed.raw().clone()),
        other => other,
    }
}

/// Flag a raw object so it is never wrapped.
pub fn mark_raw(value: Value) -> Value {
    if let Value::Object(raw) = &value {
        raw.mark_raw();
    }
    value
}

/// [`reactive`] for objects, identity for everything else.
pub fn to_reactive(value: Value) -> Value {
    if value.is_object() {
        reactive(value)
    } else {
        value
    }
}

/// [`readonly`] for objects, identity for everything else.
pub fn to_readonly(value: Value) -> Value {
    if value.is_object() {
        readonly(value)
    } else {
        value
    }
}
