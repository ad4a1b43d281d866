//! Observation Layer
//!
//! This module turns plain object and array mutation into track/trigger
//! events.
//!
//! # Concepts
//!
//! ## Raw objects
//!
//! A [`RawObject`] holds data and has an identity. Accessing it directly is
//! invisible to the reactive system.
//!
//! ## Proxies
//!
//! An [`Observed`] wraps a raw object. Reads through a mutable proxy are
//! tracked against the currently running effect; writes trigger the effects
//! that read the written key. Nested objects are wrapped lazily, on access,
//! so `reactive(obj).get("nested")` is itself reactive without wrapping the
//! whole tree up front.
//!
//! Readonly proxies reject writes and never track, since nothing can change
//! through them.
//!
//! # Structural changes
//!
//! Adding or deleting a key on a plain object also notifies enumerations of
//! that object. On arrays, enumeration depends on the length: appending an
//! element or assigning the length notifies length readers, and shrinking
//! the length also notifies readers of the removed indices.

mod handlers;
mod key;
mod object;
mod proxy;
mod registry;
mod value;

pub use key::{Key, Symbol, WellKnownSymbol};
pub use object::{RawObject, TargetId, TargetKind, MAX_ARRAY_LENGTH};
pub use proxy::{Observed, ProxyKind};
pub use registry::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, proxy_count, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, try_reactive,
    try_readonly,
};
pub use value::{has_changed, Value};
