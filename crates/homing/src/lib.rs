//! Homing: guided missiles for a host simulation, steered tick by tick
//! by external guidance servers.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Homing sub-crates. For most hosts, adding `homing` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use homing::prelude::*;
//! use homing_test_utils::fixtures::{launch_request, RICH_BUDGET};
//! use homing_test_utils::{MockTransport, MockWorld};
//!
//! // One guidance server, reached through an in-memory transport.
//! let config = LinkConfig {
//!     connection_ids: vec![ConnectionId(0)],
//!     ..LinkConfig::default()
//! };
//! let transport = MockTransport::new();
//! let link = Arc::new(GuidanceLink::new(config, Arc::new(transport.clone())).unwrap());
//!
//! let mut world = MockWorld::new();
//! let mut driver = FlightDriver::new(Arc::clone(&link), DriverConfig::default());
//! let start = Vec3::new(0.0, 64.0, 0.0);
//! let id = driver.launch(launch_request(0, RICH_BUDGET, start), &mut world);
//!
//! // The server answers the initial state with a turn.
//! let endpoint = link.config().server_address(ConnectionId(0));
//! let stream = transport.channel(&endpoint).unwrap().stream(id).unwrap();
//! stream.command(0.0, 5.0);
//!
//! assert_eq!(driver.step(id, &mut world), Some(TickOutcome::Flying));
//! assert_eq!(driver.missile(id).unwrap().attitude().yaw, 5.0);
//! assert_eq!(stream.sent().len(), 2);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `homing-core` | IDs, messages, `Vec3`, the `Uplink` seam |
//! | [`link`] | `homing-link` | Endpoint registry, sessions, command buffer, TCP transport |
//! | [`flight`] | `homing-flight` | Flight dynamics, seeker, hardware catalogue, driver |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, messages and IDs (`homing-core`).
///
/// Contains the wire messages ([`types::MissileState`],
/// [`types::ControlInput`], [`types::HardwareConfig`]) and the
/// [`types::Uplink`] trait the flight loop talks through.
pub use homing_core as types;

/// Guidance server connectivity (`homing-link`).
///
/// [`link::GuidanceLink`] owns every session; [`link::TcpTransport`] is
/// the network transport behind it.
pub use homing_link as link;

/// Per-tick flight and guidance (`homing-flight`).
///
/// [`flight::FlightDriver`] is the host's entry point; hosts implement
/// [`flight::HostWorld`] to provide world services.
pub use homing_flight as flight;

/// Common imports for typical Homing usage.
///
/// ```rust
/// use homing::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use homing_core::{
        ConnectionId, Consumed, ControlInput, EntityId, HardwareConfig, Missile, MissileId,
        MissileState, TickId, Uplink, Vec3,
    };

    // Errors
    pub use homing_core::TransportError;
    pub use homing_flight::ProfileError;
    pub use homing_link::{ConfigError, RegistryError};

    // Link
    pub use homing_link::{GuidanceLink, LinkConfig, LinkStats, SessionState, TcpTransport};

    // Flight
    pub use homing_flight::{
        DriverConfig, FlightDriver, HostWorld, Impact, LaunchRequest, LaunchTag, Launcher,
        Motion, Termination, TickOutcome, TickSummary, TrackedEntity,
    };
}
