//! Core types and traits for the Homing guidance link.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions shared by the network link and the
//! flight loop: identifiers, vector math, wire messages, error types,
//! and the [`Uplink`] trait that decouples the two.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod message;
pub mod traits;
pub mod vec3;

pub use error::TransportError;
pub use id::{ConnectionId, EntityId, MissileId, SequenceId, TickId};
pub use message::{
    Airframe, Battery, ControlInput, HardwareConfig, InertialSystem, Missile, MissileState, Motor,
    Seeker, Warhead,
};
pub use traits::{Consumed, Uplink};
pub use vec3::Vec3;
