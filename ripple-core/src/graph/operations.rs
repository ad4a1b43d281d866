//! Operation kinds carried by track and trigger events.

/// How a dependency was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOp {
    /// A property read.
    Get,
    /// A key existence check.
    Has,
    /// A key enumeration.
    Iterate,
}

/// How a target changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    /// An existing key got a new value.
    Set,
    /// A new key was added.
    Add,
    /// A key was removed.
    Delete,
}

impl TriggerOp {
    /// Whether the change altered the set of keys.
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Add | Self::Delete)
    }
}
