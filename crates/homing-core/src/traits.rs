//! The seam between the flight loop and the guidance link.

use crate::error::TransportError;
use crate::id::MissileId;
use crate::message::{ControlInput, HardwareConfig, Missile, MissileState};

/// Result of reading the latest command for one missile.
///
/// Produced once per tick by [`Uplink::consume_latest`]. A stale read is
/// still a usable command: consumers must tolerate applying the same
/// command on consecutive ticks.
#[derive(Clone, Debug, PartialEq)]
pub enum Consumed {
    /// No command has arrived since the session opened.
    Empty,
    /// A command newer than the one returned last time.
    Fresh(ControlInput),
    /// The same command as last time, or one whose sequence id did not
    /// advance. The guidance server is lagging.
    Stale(ControlInput),
    /// The inbound stream failed. The missile should be treated as if it
    /// was commanded to explode.
    LinkLost,
}

impl Consumed {
    /// The command carried by this read, fresh or stale.
    pub fn command(&self) -> Option<&ControlInput> {
        match self {
            Self::Fresh(c) | Self::Stale(c) => Some(c),
            Self::Empty | Self::LinkLost => None,
        }
    }

    /// Whether this read repeated an already-consumed sequence id.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Everything the flight loop needs from the guidance link.
///
/// Every method is non-blocking with respect to network I/O except
/// [`negotiate`](Uplink::negotiate), which waits up to a short deadline
/// and is only called once per missile at launch.
pub trait Uplink: Send + Sync {
    /// Open the guidance session and send `initial` as its first message.
    ///
    /// Returns `false` (after logging) when no endpoint is registered for
    /// the missile's connection id. No session is created in that case.
    fn establish(&self, missile: &Missile, initial: MissileState) -> bool;

    /// Push one telemetry snapshot on the missile's open session.
    ///
    /// A no-op when no session exists.
    fn send(&self, state: MissileState);

    /// Send the final snapshot and close the session.
    ///
    /// Idempotent: returns `false` when there was no session to close.
    fn terminate(&self, final_state: MissileState) -> bool;

    /// Read the most recent command for a missile.
    fn consume_latest(&self, missile: MissileId) -> Consumed;

    /// Ask the guidance server which hardware the missile should carry.
    fn negotiate(&self, missile: &Missile) -> Result<HardwareConfig, TransportError>;

    /// Whether a session for `missile` is open or still tearing down.
    ///
    /// Such ids must not be handed to a new missile. Uplinks without
    /// session teardown never hold an id past `terminate`.
    fn holds_session(&self, _missile: MissileId) -> bool {
        false
    }
}
