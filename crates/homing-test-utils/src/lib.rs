//! Test utilities and mock types for Homing development.
//!
//! - [`MockTransport`]: in-memory transport whose channels and streams
//!   can be inspected and driven from the test thread.
//! - [`RecordingUplink`]: [`Uplink`](homing_core::Uplink) that records
//!   traffic and replays scripted command reads.
//! - [`MockWorld`]: [`HostWorld`](homing_flight::HostWorld) with
//!   entities, box obstacles and a ground plane.
//! - [`fixtures`]: common values.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod transport;
pub mod uplink;
pub mod world;

pub use transport::{MockChannel, MockStream, MockTransport};
pub use uplink::RecordingUplink;
pub use world::{MockWorld, Obstacle, WorldEvent};
