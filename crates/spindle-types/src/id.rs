//! Identifier types for Spindle.
//!
//! Machine identifiers are small sequential handles, not content hashes:
//! the hosting processor assigns the next id at admission and stores it
//! back into the machine's mailbox. Lookups in the host registry are plain
//! integer map hits, and a handle stays valid (but dead) after the machine
//! is removed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a state machine hosted on a processor.
///
/// Ids are unique within the assigning processor for its lifetime and are
/// never reused. A `MachineId` says nothing about which processor assigned
/// it; routing always goes through the handle that carries both.
///
/// # Example
///
/// ```
/// use spindle_types::MachineId;
///
/// let a = MachineId::from_raw(1);
/// let b = MachineId::from_raw(2);
/// assert_ne!(a, b);
/// assert_eq!(a.raw(), 1);
/// assert_eq!(a.to_string(), "sm-1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(u64);

impl MachineId {
    /// Creates an id from a raw counter value.
    ///
    /// Intended for the hosting processor, which owns the counter. User
    /// code normally receives ids through spawn handles rather than
    /// constructing them.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sm-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        let id = MachineId::from_raw(42);
        assert_eq!(id.raw(), 42);
    }

    #[test]
    fn display_format() {
        assert_eq!(MachineId::from_raw(7).to_string(), "sm-7");
    }

    #[test]
    fn ordering_follows_assignment() {
        assert!(MachineId::from_raw(1) < MachineId::from_raw(2));
    }

    #[test]
    fn usable_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(MachineId::from_raw(1), "first");
        map.insert(MachineId::from_raw(2), "second");
        assert_eq!(map[&MachineId::from_raw(1)], "first");
    }
}
