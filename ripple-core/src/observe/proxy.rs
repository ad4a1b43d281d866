//! Observation Proxies
//!
//! An [`Observed`] is the explicit stand-in for a transparent proxy: every
//! property access goes through a method, and the method routes through the
//! handler for the proxy's kind. Reads through a mutable proxy record
//! dependencies; writes notify the effects that depend on the written key.
//!
//! # Identity
//!
//! Proxies are created through the registry (`reactive`, `readonly`, ...),
//! which guarantees one proxy per (raw object, kind). Two handles compare
//! equal when they are the same proxy.
//!
//! # Introspection
//!
//! `is_reactive`, `is_readonly`, `is_shallow` and `raw` answer from the proxy
//! itself. They never touch the target and never track.

use std::fmt;
use std::sync::Arc;

use super::handlers::{
    ProxyHandler, MUTABLE_HANDLERS, READONLY_HANDLERS, SHALLOW_REACTIVE_HANDLERS,
    SHALLOW_READONLY_HANDLERS,
};
use super::key::Key;
use super::object::{RawObject, TargetId};
use super::registry;
use super::value::Value;
use crate::error::ReactiveError;
use crate::reactive::untracked;

/// The four proxy flavors. Each has its own registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl ProxyKind {
    /// Whether writes through this kind are rejected.
    pub fn is_readonly(self) -> bool {
        matches!(self, Self::Readonly | Self::ShallowReadonly)
    }

    /// Whether nested objects are returned unwrapped.
    pub fn is_shallow(self) -> bool {
        matches!(self, Self::ShallowReactive | Self::ShallowReadonly)
    }

    pub(crate) fn handler(self) -> &'static dyn ProxyHandler {
        match self {
            Self::Reactive => &MUTABLE_HANDLERS,
            Self::ShallowReactive => &SHALLOW_REACTIVE_HANDLERS,
            Self::Readonly => &READONLY_HANDLERS,
            Self::ShallowReadonly => &SHALLOW_READONLY_HANDLERS,
        }
    }
}

pub(crate) struct ProxyInner {
    pub(crate) raw: RawObject,
    pub(crate) kind: ProxyKind,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        registry::forget_proxy(self.kind, self.raw.id());
    }
}

/// A proxy over a [`RawObject`].
#[derive(Clone)]
pub struct Observed {
    inner: Arc<ProxyInner>,
}

impl Observed {
    pub(crate) fn from_inner(inner: Arc<ProxyInner>) -> Self {
        Self { inner }
    }

    fn handler(&self) -> &'static dyn ProxyHandler {
        self.inner.kind.handler()
    }

    /// Which of the four proxy kinds this is.
    pub fn kind(&self) -> ProxyKind {
        self.inner.kind
    }

    /// `true` for mutable proxies.
    pub fn is_reactive(&self) -> bool {
        !self.inner.kind.is_readonly()
    }

    /// Whether writes through this proxy are rejected.
    pub fn is_readonly(&self) -> bool {
        self.inner.kind.is_readonly()
    }

    /// Whether nested reads return raw values.
    pub fn is_shallow(&self) -> bool {
        self.inner.kind.is_shallow()
    }

    /// The wrapped object.
    pub fn raw(&self) -> &RawObject {
        &self.inner.raw
    }

    /// Id of the observed target.
    pub fn target_id(&self) -> TargetId {
        self.inner.raw.id()
    }

    /// Whether the observed target is an array.
    pub fn is_array(&self) -> bool {
        self.inner.raw.is_array()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a property. Nested objects come back wrapped in a proxy of the
    /// same mutability (unless this proxy is shallow).
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.handler().get(&self.inner.raw, key.into())
    }

    /// Write a property. Returns `false` if the write was rejected.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(err) => {
                dev_warn!(target_id = %self.target_id(), "{err}");
                false
            }
        }
    }

    /// Write a property, reporting why a refused write failed.
    pub fn try_set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ReactiveError> {
        self.handler().set(&self.inner.raw, key.into(), value.into())
    }

    /// Delete a property. Deleting a missing key succeeds.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        match self.try_delete(key) {
            Ok(()) => true,
            Err(err) => {
                dev_warn!(target_id = %self.target_id(), "{err}");
                false
            }
        }
    }

    /// Delete a property, reporting why a refused delete failed.
    pub fn try_delete(&self, key: impl Into<Key>) -> Result<(), ReactiveError> {
        self.handler().delete(&self.inner.raw, key.into())
    }

    /// Key existence check.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.handler().has(&self.inner.raw, key.into())
    }

    /// Enumerate own keys. Depends on the key set, not on the values.
    pub fn own_keys(&self) -> Vec<Key> {
        self.handler().own_keys(&self.inner.raw)
    }

    /// Array length, or number of properties.
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.get(Key::Length)
                .and_then(|len| len.as_length())
                .unwrap_or_default()
        } else {
            self.own_keys().len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append to an array. Returns the new length.
    ///
    /// The length read happens untracked, so an effect that pushes does not
    /// depend on the array's length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize, ReactiveError> {
        self.ensure_mutable_array("push")?;
        let len = untracked(|| self.len());
        self.try_set(Key::Index(len), value)?;
        Ok(len + 1)
    }

    /// Remove the last element of an array.
    pub fn pop(&self) -> Result<Option<Value>, ReactiveError> {
        self.ensure_mutable_array("pop")?;
        let (len, last) = untracked(|| {
            let len = self.len();
            let last = len.checked_sub(1).and_then(|index| self.get(index));
            (len, last)
        });
        if len == 0 {
            return Ok(None);
        }
        self.try_set(Key::Length, len - 1)?;
        Ok(last)
    }

    fn ensure_mutable_array(&self, op: &'static str) -> Result<(), ReactiveError> {
        if !self.is_array() {
            return Err(ReactiveError::NotAnArray(self.target_id()));
        }
        if self.is_readonly() {
            return Err(ReactiveError::ReadonlyTarget { op, key: Key::Length });
        }
        Ok(())
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Observed {}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("kind", &self.inner.kind)
            .field("target", &self.inner.raw.id())
            .finish()
    }
}
