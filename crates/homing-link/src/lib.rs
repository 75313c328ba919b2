//! Guidance server link for Homing missiles.
//!
//! Keeps one reusable channel per guidance server, probes every channel
//! for liveness, opens one duplex stream per missile, buffers the latest
//! inbound command without ever blocking the simulation tick, and tears
//! sessions down in bounded time on a background worker.
//!
//! The entry point is [`GuidanceLink`], which implements
//! [`homing_core::Uplink`] for the flight loop.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod codec;
pub mod completion;
pub mod config;
pub mod link;
pub mod metrics;
pub mod prober;
pub mod registry;
pub mod session;
pub mod tcp;
pub mod transport;
mod worker;

pub use buffer::CommandBuffer;
pub use completion::{Completion, CompletionSignal};
pub use config::{ConfigError, LinkConfig};
pub use link::{GuidanceLink, ShutdownReport};
pub use metrics::{LinkMetrics, LinkStats};
pub use prober::{LivenessProber, ProbeReport};
pub use registry::{EndpointRegistry, RegistryError};
pub use session::{SessionManager, SessionState, TeardownOutcome};
pub use tcp::TcpTransport;
pub use transport::{Channel, OutboundStream, StreamEvent, StreamObserver, Transport};
