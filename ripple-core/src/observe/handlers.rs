//! Proxy handlers.
//!
//! Each proxy kind dispatches its property operations through one of four
//! static handlers. The mutable handlers funnel reads into `track` and
//! writes into `trigger`; the readonly handlers do neither.
//!
//! Keys are normalized for the target's shape before any lookup, so `"2"`
//! and `2` address the same array slot and the same dependency.

use super::key::Key;
use super::object::{RawObject, Stored};
use super::registry::{is_readonly, to_raw, to_readonly, to_reactive};
use super::value::{has_changed, Value};
use crate::error::ReactiveError;
use crate::graph::{TrackOp, TriggerOp};
use crate::reactive::{track, trigger};

/// The trap set behind a proxy.
pub(crate) trait ProxyHandler: Sync {
    fn get(&self, target: &RawObject, key: Key) -> Option<Value>;

    fn set(&self, target: &RawObject, key: Key, value: Value) -> Result<(), ReactiveError>;

    fn delete(&self, target: &RawObject, key: Key) -> Result<(), ReactiveError>;

    fn has(&self, target: &RawObject, key: Key) -> bool;

    fn own_keys(&self, target: &RawObject) -> Vec<Key>;
}

pub(crate) struct MutableHandler {
    shallow: bool,
}

pub(crate) struct ReadonlyHandler {
    shallow: bool,
}

pub(crate) static MUTABLE_HANDLERS: MutableHandler = MutableHandler { shallow: false };
pub(crate) static SHALLOW_REACTIVE_HANDLERS: MutableHandler = MutableHandler { shallow: true };
pub(crate) static READONLY_HANDLERS: ReadonlyHandler = ReadonlyHandler { shallow: false };
pub(crate) static SHALLOW_READONLY_HANDLERS: ReadonlyHandler = ReadonlyHandler { shallow: true };

/// Key an enumeration depends on: arrays enumerate by length.
fn iteration_key(target: &RawObject) -> Key {
    if target.is_array() {
        Key::Length
    } else {
        Key::Iterate
    }
}

impl ProxyHandler for MutableHandler {
    fn get(&self, target: &RawObject, key: Key) -> Option<Value> {
        let key = target.normalize(key);
        if key.is_sentinel() {
            return None;
        }

        let result = target.lookup(&key);

        // Absent keys are tracked too, so a later ADD reaches this reader.
        track(target.id(), TrackOp::Get, key);

        if self.shallow {
            return result;
        }
        result.map(to_reactive)
    }

    fn set(&self, target: &RawObject, key: Key, value: Value) -> Result<(), ReactiveError> {
        let key = target.normalize(key);
        if key.is_sentinel() {
            return Err(ReactiveError::SentinelKey);
        }

        let value = if !self.shallow && !is_readonly(&value) {
            to_raw(value)
        } else {
            value
        };

        match target.store(&key, value.clone())? {
            Stored::Added => trigger(target.id(), TriggerOp::Add, &key, Some(&value), None),
            Stored::Replaced(old) => {
                if has_changed(&value, &old) {
                    trigger(target.id(), TriggerOp::Set, &key, Some(&value), Some(&old));
                }
            }
        }
        Ok(())
    }

    fn delete(&self, target: &RawObject, key: Key) -> Result<(), ReactiveError> {
        let key = target.normalize(key);
        if key.is_sentinel() {
            return Err(ReactiveError::SentinelKey);
        }

        if let Some(old) = target.remove(&key)? {
            trigger(target.id(), TriggerOp::Delete, &key, None, Some(&old));
        }
        Ok(())
    }

    fn has(&self, target: &RawObject, key: Key) -> bool {
        let key = target.normalize(key);
        if key.is_sentinel() {
            return false;
        }

        let result = target.contains(&key);
        if !key.is_well_known_symbol() {
            track(target.id(), TrackOp::Has, key);
        }
        result
    }

    fn own_keys(&self, target: &RawObject) -> Vec<Key> {
        track(target.id(), TrackOp::Iterate, iteration_key(target));
        target.keys()
    }
}

impl ProxyHandler for ReadonlyHandler {
    fn get(&self, target: &RawObject, key: Key) -> Option<Value> {
        let key = target.normalize(key);
        if key.is_sentinel() {
            return None;
        }

        let result = target.lookup(&key);
        if self.shallow {
            return result;
        }
        result.map(to_readonly)
    }

    fn set(&self, target: &RawObject, key: Key, _value: Value) -> Result<(), ReactiveError> {
        Err(ReactiveError::ReadonlyTarget {
            op: "set",
            key: target.normalize(key),
        })
    }

    fn delete(&self, target: &RawObject, key: Key) -> Result<(), ReactiveError> {
        Err(ReactiveError::ReadonlyTarget {
            op: "delete",
            key: target.normalize(key),
        })
    }

    fn has(&self, target: &RawObject, key: Key) -> bool {
        let key = target.normalize(key);
        !key.is_sentinel() && target.contains(&key)
    }

    fn own_keys(&self, target: &RawObject) -> Vec<Key> {
        target.keys()
    }
}
