//! Property keys.
//!
//! Keys identify the property half of a (target, key) dependency. Two keys
//! are synthetic: [`Key::Length`] is an array's length and [`Key::Iterate`]
//! stands for "the set of keys" of a plain object, which enumeration tracks
//! and structural changes trigger.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The built-in symbols. Lookups of these are engine plumbing, not data
/// reads, so `has` never tracks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    AsyncIterator,
    HasInstance,
    IsConcatSpreadable,
    Iterator,
    Match,
    MatchAll,
    Replace,
    Search,
    Species,
    Split,
    ToPrimitive,
    ToStringTag,
    Unscopables,
}

impl WellKnownSymbol {
    pub const ALL: [WellKnownSymbol; 13] = [
        Self::AsyncIterator,
        Self::HasInstance,
        Self::IsConcatSpreadable,
        Self::Iterator,
        Self::Match,
        Self::MatchAll,
        Self::Replace,
        Self::Search,
        Self::Species,
        Self::Split,
        Self::ToPrimitive,
        Self::ToStringTag,
        Self::Unscopables,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Self::AsyncIterator => "Symbol.asyncIterator",
            Self::HasInstance => "Symbol.hasInstance",
            Self::IsConcatSpreadable => "Symbol.isConcatSpreadable",
            Self::Iterator => "Symbol.iterator",
            Self::Match => "Symbol.match",
            Self::MatchAll => "Symbol.matchAll",
            Self::Replace => "Symbol.replace",
            Self::Search => "Symbol.search",
            Self::Species => "Symbol.species",
            Self::Split => "Symbol.split",
            Self::ToPrimitive => "Symbol.toPrimitive",
            Self::ToStringTag => "Symbol.toStringTag",
            Self::Unscopables => "Symbol.unscopables",
        }
    }
}

/// A symbol property key: either built-in or unique per [`Symbol::new`] call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    WellKnown(WellKnownSymbol),
    Unique { id: u64, description: Arc<str> },
}

impl Symbol {
    /// Create a fresh symbol, distinct from every other symbol.
    pub fn new(description: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self::Unique {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: Arc::from(description),
        }
    }

    pub fn is_well_known(&self) -> bool {
        matches!(self, Self::WellKnown(_))
    }

    /// The symbol's description.
    pub fn description(&self) -> &str {
        match self {
            Self::WellKnown(symbol) => symbol.description(),
            Self::Unique { description, .. } => description,
        }
    }
}

impl From<WellKnownSymbol> for Symbol {
    fn from(symbol: WellKnownSymbol) -> Self {
        Self::WellKnown(symbol)
    }
}

/// A property key, or one of the two synthetic keys used by the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named property.
    Name(Arc<str>),
    /// An array element.
    Index(usize),
    /// A symbol-keyed property.
    Symbol(Symbol),
    /// An array's length.
    Length,
    /// Enumeration sentinel for plain objects.
    Iterate,
}

impl Key {
    /// A named property key.
    pub fn name(name: &str) -> Self {
        Self::Name(Arc::from(name))
    }

    /// `true` for the enumeration sentinel, which is never a real property.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Iterate)
    }

    /// Whether this is a well-known symbol key. Those are never tracked by `has`.
    pub fn is_well_known_symbol(&self) -> bool {
        matches!(self, Self::Symbol(symbol) if symbol.is_well_known())
    }

    /// Canonical form on an array: `"length"` is the length and canonical
    /// decimal names are indices.
    pub(crate) fn for_array(self) -> Self {
        match self {
            Self::Name(name) if &*name == "length" => Self::Length,
            Self::Name(name) => match parse_index(&name) {
                Some(index) => Self::Index(index),
                None => Self::Name(name),
            },
            other => other,
        }
    }

    /// Canonical form on a plain object: indices are just names.
    pub(crate) fn for_object(self) -> Self {
        match self {
            Self::Index(index) => Self::Name(Arc::from(index.to_string())),
            Self::Length => Self::name("length"),
            other => other,
        }
    }
}

// "01" and "+1" are named properties, not indices.
fn parse_index(name: &str) -> Option<usize> {
    let index = name.parse::<usize>().ok()?;
    (index.to_string() == name).then_some(index)
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
            Self::Symbol(symbol) => write!(f, "Symbol({})", symbol.description()),
            Self::Length => f.write_str("length"),
            Self::Iterate => f.write_str("<iterate>"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::name(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(Arc::from(name))
    }
}

impl From<Arc<str>> for Key {
    fn from(name: Arc<str>) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<WellKnownSymbol> for Key {
    fn from(symbol: WellKnownSymbol) -> Self {
        Self::Symbol(Symbol::WellKnown(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_keys_normalize() {
        assert_eq!(Key::from("length").for_array(), Key::Length);
        assert_eq!(Key::from("3").for_array(), Key::Index(3));
        assert_eq!(Key::from("03").for_array(), Key::name("03"));
        assert_eq!(Key::from("foo").for_array(), Key::name("foo"));
    }

    #[test]
    fn object_keys_normalize() {
        assert_eq!(Key::Index(2).for_object(), Key::name("2"));
        assert_eq!(Key::Length.for_object(), Key::name("length"));
        assert_eq!(Key::Iterate.for_object(), Key::Iterate);
    }

    #[test]
    fn unique_symbols_are_distinct() {
        let a = Symbol::new("tag");
        let b = Symbol::new("tag");
        assert_ne!(a, b);
        assert_eq!(a.description(), "tag");
        assert!(!a.is_well_known());
        assert!(Key::from(WellKnownSymbol::Iterator).is_well_known_symbol());
    }
}
