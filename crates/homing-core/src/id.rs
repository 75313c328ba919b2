//! Strongly-typed identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one missile for the lifetime of its guidance session.
///
/// Generated randomly at launch. Always non-negative when viewed as a
/// signed 32-bit integer, so guidance servers written against signed
/// ids see the same value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissileId(pub u32);

impl MissileId {
    /// Largest id a missile may carry (`i32::MAX`).
    pub const MAX: MissileId = MissileId(i32::MAX as u32);

    /// Fold an arbitrary random value into the non-negative id range.
    pub fn from_random(raw: u32) -> Self {
        Self(raw & Self::MAX.0)
    }
}

impl fmt::Display for MissileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MissileId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Selects which guidance server a missile talks to.
///
/// `ConnectionId(n)` resolves to the n-th configured server address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ConnectionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Server-assigned command sequence number.
///
/// The only ordering signal on inbound commands: a guidance server must
/// issue strictly increasing ids on one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub u64);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SequenceId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Per-missile tick counter.
///
/// Tick 0 is the launch tick; telemetry carries the tick it was
/// produced on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickId(pub u64);

impl TickId {
    /// The tick after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Host-side identity of a world entity (a seeker target or a launcher).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_missile_ids_are_non_negative() {
        for raw in [0, 1, u32::MAX, 0x8000_0000, 0x7fff_ffff] {
            let id = MissileId::from_random(raw);
            assert!(id <= MissileId::MAX);
            assert!(i32::try_from(id.0).is_ok());
        }
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&SequenceId(7)).unwrap();
        assert_eq!(json, "7");
        let back: ConnectionId = serde_json::from_str("12").unwrap();
        assert_eq!(back, ConnectionId(12));
    }

    #[test]
    fn tick_next_increments() {
        assert_eq!(TickId(0).next(), TickId(1));
    }
}
