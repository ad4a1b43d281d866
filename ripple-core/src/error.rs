//! Error types for the reactive system.
//!
//! Most public entry points never fail loudly: wrapping an invalid target
//! returns it unchanged and writing through a readonly proxy reports `false`.
//! The `try_*` variants surface the underlying reason as a [`ReactiveError`].

use thiserror::Error;

use crate::observe::{Key, TargetId, TargetKind};

/// Why an observation or mutation request was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// Only objects and arrays can be observed.
    #[error("value cannot be made reactive: {type_name}")]
    InvalidTarget { type_name: &'static str },

    /// The object was flagged with `mark_raw`.
    #[error("{0} is marked raw and will not be observed")]
    MarkedRaw(TargetId),

    /// The object no longer accepts new properties.
    #[error("{0} is not extensible")]
    NotExtensible(TargetId),

    /// A mutation was attempted through a readonly proxy.
    #[error("{op} operation on key \"{key}\" failed: target is readonly")]
    ReadonlyTarget { op: &'static str, key: Key },

    /// The property currently holds a readonly proxy and cannot be reassigned.
    #[error("set operation on key \"{key}\" failed: current value is readonly")]
    ReadonlyValue { key: Key },

    /// An array-only operation was used on a plain object.
    #[error("{0} is not an array")]
    NotAnArray(TargetId),

    /// Array lengths must be non-negative integers.
    #[error("invalid array length: {0}")]
    InvalidLength(f64),

    /// Array indices must be below `MAX_ARRAY_LENGTH`.
    #[error("array index {0} is out of range")]
    IndexOutOfRange(usize),

    /// The key has no meaning for this target shape (e.g. a named property
    /// on an array, or deleting an array's length).
    #[error("key \"{key}\" is not supported on {kind} targets")]
    UnsupportedKey { key: Key, kind: TargetKind },

    /// The enumeration sentinel is not a real property.
    #[error("the iteration sentinel cannot be read or written")]
    SentinelKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_key() {
        let err = ReactiveError::ReadonlyTarget {
            op: "set",
            key: Key::from("count"),
        };
        assert_eq!(
            err.to_string(),
            "set operation on key \"count\" failed: target is readonly"
        );

        let err = ReactiveError::UnsupportedKey {
            key: Key::Length,
            kind: TargetKind::Array,
        };
        assert_eq!(err.to_string(), "key \"length\" is not supported on array targets");
    }
}
