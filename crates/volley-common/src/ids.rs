//! ID types for assets, channels and playbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of an audio asset in the catalog (e.g. `"Gunfire"`).
///
/// Cheap to clone; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Arc<str>);

impl AssetId {
    /// Creates an asset ID from a name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the asset name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AssetId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Slot index of a playback channel inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u32);

impl ChannelId {
    /// Creates a channel ID from a raw slot index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// Unique identifier of one playback.
///
/// Handle IDs are never reused, so a stale ID can never alias a newer playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    /// Null/invalid handle ID.
    pub const NULL: Self = Self(0);

    /// Creates a handle ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this is a valid (non-null) handle ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h#{}", self.0)
    }
}

/// Ticket returned by a pending wait-for-completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitTicket(u64);

impl WaitTicket {
    /// Creates a ticket from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Monotonic ID source for handles and tickets.
#[derive(Debug)]
pub struct IdSequence {
    next: u64,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSequence {
    /// Creates a sequence starting at 1 (0 is reserved as null).
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next raw value.
    pub fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Returns the next handle ID.
    pub fn next_handle(&mut self) -> HandleId {
        HandleId(self.next_raw())
    }

    /// Returns the next wait ticket.
    pub fn next_ticket(&mut self) -> WaitTicket {
        WaitTicket(self.next_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        id: AssetId,
    }

    #[test]
    fn test_asset_id_serializes_as_plain_string() {
        let wrapper = Wrapper {
            id: AssetId::new("Gunfire"),
        };
        let text = toml::to_string(&wrapper).expect("serialize");
        assert_eq!(text.trim(), "id = \"Gunfire\"");

        let parsed: Wrapper = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, wrapper);
    }

    #[test]
    fn test_sequence_starts_after_null() {
        let mut ids = IdSequence::new();
        let first = ids.next_handle();
        assert!(first.is_valid());
        assert_ne!(ids.next_handle(), first);
    }
}
