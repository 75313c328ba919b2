//! Per-tick flight and guidance for Homing missiles.
//!
//! Each tick a [`GuidedMissile`] consumes its latest guidance command,
//! applies hardware-bounded control limits, integrates flight dynamics
//! with gravity, drag, thrust and Gaussian noise, runs target
//! acquisition, and sends telemetry back through an
//! [`Uplink`](homing_core::Uplink). The host simulation drives every
//! missile through a [`FlightDriver`] and provides world services via
//! [`HostWorld`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod control;
pub mod driver;
pub mod dynamics;
pub mod host;
pub mod identify;
pub mod missile;
pub mod noise;
pub mod profile;
pub mod seeker;

pub use driver::{DriverConfig, FlightDriver, LaunchRequest, TickSummary};
pub use dynamics::{Attitude, GRAVITY};
pub use host::{HostWorld, Impact, Motion, TrackedEntity};
pub use identify::{calculate_budget, Charge, ChargeShape, LaunchTag};
pub use missile::{FlightPhase, GuidedMissile, Launch, Launcher, Termination, TickOutcome};
pub use noise::GaussianNoise;
pub use profile::{HardwareProfile, ProfileError};
