//! Raw Objects
//!
//! A [`RawObject`] is the unobserved target behind a proxy: an
//! insertion-ordered property map or an array of values, with a stable
//! [`TargetId`] that the dependency graph and proxy registries key on.
//!
//! Reading or writing a raw object directly never tracks and never triggers;
//! it is the equivalent of mutating the original object behind a proxy's
//! back.
//!
//! # Arrays
//!
//! Arrays are sparse. A slot that was never written, or was deleted, is a
//! hole: reads return `None` and `contains_key` is `false`. Lengths are
//! capped at [`MAX_ARRAY_LENGTH`].
//!
//! # Reclamation
//!
//! Neither the graph nor the registries hold the object itself. When the last
//! handle is dropped, its dependency data is removed from the graph.

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::key::Key;
use super::registry::is_readonly;
use super::value::Value;
use crate::error::ReactiveError;
use crate::graph;

/// Largest array length. Valid indices are below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Unique identifier of an observable target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh target id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of the id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Shape of a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Object,
    Array,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::Array => f.write_str("array"),
        }
    }
}

enum ObjectData {
    Object(IndexMap<Key, Value>),
    Array(Slots),
}

/// Sparse array storage.
#[derive(Default)]
struct Slots {
    len: usize,
    items: BTreeMap<usize, Value>,
}

impl Slots {
    fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let items: BTreeMap<usize, Value> = values.into_iter().enumerate().collect();
        Self {
            len: items.len(),
            items,
        }
    }

    fn insert(&mut self, index: usize, value: Value) {
        self.items.insert(index, value);
        self.len = self.len.max(index + 1);
    }

    /// Grow with holes, or drop every slot at or past `len`.
    fn set_len(&mut self, len: usize) {
        if len < self.len {
            drop(self.items.split_off(&len));
        }
        self.len = len;
    }
}

/// Outcome of a write.
pub(crate) enum Stored {
    Added,
    Replaced(Value),
}

struct ObjectInner {
    id: TargetId,
    kind: TargetKind,
    data: RwLock<ObjectData>,
    skip: AtomicBool,
    extensible: AtomicBool,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        graph::forget_target(self.id);
    }
}

/// An observable plain object or array.
///
/// Cloning shares the same underlying object (and identity).
#[derive(Clone)]
pub struct RawObject {
    inner: Arc<ObjectInner>,
}

impl RawObject {
    fn with_data(kind: TargetKind, data: ObjectData) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: TargetId::new(),
                kind,
                data: RwLock::new(data),
                skip: AtomicBool::new(false),
                extensible: AtomicBool::new(true),
            }),
        }
    }

    /// Create an empty plain object.
    pub fn object() -> Self {
        Self::with_data(TargetKind::Object, ObjectData::Object(IndexMap::new()))
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Self::with_data(TargetKind::Array, ObjectData::Array(Slots::default()))
    }

    /// Create a plain object from key/value pairs, keeping their order.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let props = entries
            .into_iter()
            .map(|(key, value)| (key.into().for_object(), value.into()))
            .collect();
        Self::with_data(TargetKind::Object, ObjectData::Object(props))
    }

    /// Create an array from values.
    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let slots = Slots::from_values(values.into_iter().map(Into::into));
        Self::with_data(TargetKind::Array, ObjectData::Array(slots))
    }

    /// The id the dependency graph and registries key on.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Whether this is a plain object or an array.
    pub fn kind(&self) -> TargetKind {
        self.inner.kind
    }

    pub fn is_array(&self) -> bool {
        self.inner.kind == TargetKind::Array
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Flag this object so that `reactive`/`readonly` return it unwrapped.
    pub fn mark_raw(&self) {
        self.inner.skip.store(true, Ordering::SeqCst);
    }

    /// Whether [`mark_raw`](Self::mark_raw) was called.
    pub fn is_marked_raw(&self) -> bool {
        self.inner.skip.load(Ordering::SeqCst)
    }

    /// Refuse new properties (and new array slots) from now on. Such objects
    /// can no longer be observed.
    pub fn prevent_extensions(&self) {
        self.inner.extensible.store(false, Ordering::SeqCst);
    }

    /// Whether new properties may still be added.
    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Untracked access
    // ------------------------------------------------------------------------

    /// Read a property without tracking.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.lookup(&self.normalize(key.into()))
    }

    /// Write a property without triggering. Returns the previous value.
    pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Option<Value>, ReactiveError> {
        let key = self.normalize(key.into());
        if key.is_sentinel() {
            return Err(ReactiveError::SentinelKey);
        }
        Ok(match self.store(&key, value.into())? {
            Stored::Added => None,
            Stored::Replaced(previous) => Some(previous),
        })
    }

    /// Delete a property without triggering. Returns the removed value.
    pub fn delete(&self, key: impl Into<Key>) -> Result<Option<Value>, ReactiveError> {
        self.remove(&self.normalize(key.into()))
    }

    /// Whether the property exists. Array holes do not.
    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.contains(&self.normalize(key.into()))
    }

    /// Number of properties, or the array length.
    pub fn len(&self) -> usize {
        match &*self.inner.data.read() {
            ObjectData::Object(props) => props.len(),
            ObjectData::Array(slots) => slots.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Own keys: properties in insertion order, or the filled indices then
    /// `Length`.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.inner.data.read() {
            ObjectData::Object(props) => props.keys().cloned().collect(),
            ObjectData::Array(slots) => slots
                .items
                .keys()
                .copied()
                .map(Key::Index)
                .chain(std::iter::once(Key::Length))
                .collect(),
        }
    }

    /// Property values, or filled array elements, in order. Holes are
    /// skipped.
    pub fn values(&self) -> Vec<Value> {
        match &*self.inner.data.read() {
            ObjectData::Object(props) => props.values().cloned().collect(),
            ObjectData::Array(slots) => slots.items.values().cloned().collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Normalized-key primitives used by the proxy handlers
    // ------------------------------------------------------------------------

    pub(crate) fn normalize(&self, key: Key) -> Key {
        match self.inner.kind {
            TargetKind::Object => key.for_object(),
            TargetKind::Array => key.for_array(),
        }
    }

    pub(crate) fn lookup(&self, key: &Key) -> Option<Value> {
        match &*self.inner.data.read() {
            ObjectData::Object(props) => props.get(key).cloned(),
            ObjectData::Array(slots) => match key {
                Key::Index(index) => slots.items.get(index).cloned(),
                Key::Length => Some(Value::from(slots.len)),
                _ => None,
            },
        }
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        match &*self.inner.data.read() {
            ObjectData::Object(props) => props.contains_key(key),
            ObjectData::Array(slots) => match key {
                Key::Index(index) => slots.items.contains_key(index),
                Key::Length => true,
                _ => false,
            },
        }
    }

    /// Write `value` under `key`. A property currently holding a readonly
    /// proxy cannot be reassigned.
    pub(crate) fn store(&self, key: &Key, value: Value) -> Result<Stored, ReactiveError> {
        let extensible = self.is_extensible();
        let mut data = self.inner.data.write();
        match &mut *data {
            ObjectData::Object(props) => {
                if let Some(current) = props.get_mut(key) {
                    if is_readonly(current) {
                        return Err(ReactiveError::ReadonlyValue { key: key.clone() });
                    }
                    return Ok(Stored::Replaced(mem::replace(current, value)));
                }
                if !extensible {
                    return Err(ReactiveError::NotExtensible(self.id()));
                }
                props.insert(key.clone(), value);
                Ok(Stored::Added)
            }
            ObjectData::Array(slots) => match key {
                Key::Index(index) => {
                    if let Some(current) = slots.items.get_mut(index) {
                        if is_readonly(current) {
                            return Err(ReactiveError::ReadonlyValue { key: key.clone() });
                        }
                        return Ok(Stored::Replaced(mem::replace(current, value)));
                    }
                    if *index >= MAX_ARRAY_LENGTH {
                        return Err(ReactiveError::IndexOutOfRange(*index));
                    }
                    if !extensible {
                        return Err(ReactiveError::NotExtensible(self.id()));
                    }
                    slots.insert(*index, value);
                    Ok(Stored::Added)
                }
                Key::Length => {
                    let len = value
                        .as_length()
                        .ok_or_else(|| ReactiveError::InvalidLength(value.as_f64().unwrap_or(f64::NAN)))?;
                    let previous = slots.len;
                    slots.set_len(len);
                    Ok(Stored::Replaced(Value::from(previous)))
                }
                other => Err(ReactiveError::UnsupportedKey {
                    key: other.clone(),
                    kind: TargetKind::Array,
                }),
            },
        }
    }

    /// Remove `key`. Array elements leave a hole; the length stays.
    pub(crate) fn remove(&self, key: &Key) -> Result<Option<Value>, ReactiveError> {
        let mut data = self.inner.data.write();
        match &mut *data {
            ObjectData::Object(props) => Ok(props.shift_remove(key)),
            ObjectData::Array(slots) => match key {
                Key::Index(index) => Ok(slots.items.remove(index)),
                other => Err(ReactiveError::UnsupportedKey {
                    key: other.clone(),
                    kind: TargetKind::Array,
                }),
            },
        }
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RawObject {}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keeps_insertion_order() {
        let raw = RawObject::from_entries([("b", 1), ("a", 2)]);
        raw.insert("c", 3).unwrap();
        assert_eq!(raw.keys(), vec![Key::from("b"), Key::from("a"), Key::from("c")]);

        raw.delete("b").unwrap();
        assert_eq!(raw.keys(), vec![Key::from("a"), Key::from("c")]);
    }

    #[test]
    fn array_index_write_leaves_holes() {
        let raw = RawObject::from_values([1]);
        raw.insert(3usize, 4).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw.get(1usize), None);
        assert!(!raw.contains_key(1usize));
        assert_eq!(raw.get("length").and_then(|v| v.as_f64()), Some(4.0));
        assert_eq!(raw.keys(), vec![Key::Index(0), Key::Index(3), Key::Length]);
        assert_eq!(raw.values().len(), 2);
    }

    #[test]
    fn far_writes_are_rejected() {
        let raw = RawObject::from_values([1]);
        assert_eq!(
            raw.insert(usize::MAX, 1),
            Err(ReactiveError::IndexOutOfRange(usize::MAX))
        );
        assert_eq!(
            raw.insert(MAX_ARRAY_LENGTH, 1),
            Err(ReactiveError::IndexOutOfRange(MAX_ARRAY_LENGTH))
        );
        assert!(raw.insert(Key::Length, MAX_ARRAY_LENGTH as f64 + 1.0).is_err());
        assert_eq!(raw.len(), 1);

        // The largest length is accepted without allocating the slots.
        raw.insert(Key::Length, MAX_ARRAY_LENGTH).unwrap();
        assert_eq!(raw.len(), MAX_ARRAY_LENGTH);
        raw.insert(MAX_ARRAY_LENGTH - 1, 2).unwrap();
        assert_eq!(raw.values().len(), 2);
    }

    #[test]
    fn array_length_truncates() {
        let raw = RawObject::from_values([1, 2, 3]);
        let previous = raw.insert(Key::Length, 1).unwrap();
        assert_eq!(previous.and_then(|v| v.as_f64()), Some(3.0));
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.get(1usize), None);

        raw.insert(Key::Length, 3).unwrap();
        assert_eq!(raw.len(), 3);
        assert!(!raw.contains_key(2usize));

        assert_eq!(raw.insert(Key::Length, -1), Err(ReactiveError::InvalidLength(-1.0)));
    }

    #[test]
    fn array_delete_leaves_hole() {
        let raw = RawObject::from_values([1, 2]);
        let removed = raw.delete(0usize).unwrap();
        assert_eq!(removed.and_then(|v| v.as_f64()), Some(1.0));
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get(0usize), None);
        assert!(!raw.contains_key(0usize));
        assert_eq!(raw.delete(0usize), Ok(None));
        assert!(raw.delete(Key::Length).is_err());
    }

    #[test]
    fn non_extensible_rejects_new_keys() {
        let raw = RawObject::from_entries([("a", 1)]);
        raw.prevent_extensions();
        assert!(raw.insert("a", 2).is_ok());
        assert_eq!(raw.insert("b", 1), Err(ReactiveError::NotExtensible(raw.id())));
    }

    #[test]
    fn ids_are_unique() {
        let a = RawObject::object();
        let b = RawObject::object();
        assert_ne!(a.id(), b.id());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }
}
