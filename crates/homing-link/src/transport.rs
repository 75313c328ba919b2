//! Transport abstraction: channels, duplex streams and their observers.
//!
//! A [`Transport`] hands out one [`Channel`] per server endpoint.
//! Channels are lazy: creating one performs no I/O, and the first
//! request on it pays the connection setup cost. That is why the link
//! probes every channel right after registering it.
//!
//! Inbound traffic is pushed to a [`StreamObserver`] from whatever
//! thread the transport reads on. Outbound traffic goes through an
//! [`OutboundStream`], whose methods never block.

use std::sync::Arc;
use std::time::Duration;

use homing_core::{ControlInput, HardwareConfig, Missile, MissileState, TransportError};

/// Something delivered to a stream observer.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A command arrived.
    Command(ControlInput),
    /// The server finished the stream normally. Terminal.
    Completed,
    /// The stream failed. Terminal.
    Failed(TransportError),
}

impl StreamEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Command(_))
    }
}

/// Receives inbound stream events.
///
/// Called from transport threads, concurrently across missiles and
/// concurrently with the tick loop. Implementations must not block.
pub trait StreamObserver: Send + Sync {
    /// Handle one event. At most one terminal event is delivered by a
    /// well-behaved transport, but observers must tolerate duplicates.
    fn on_event(&self, event: StreamEvent);
}

impl<F> StreamObserver for F
where
    F: Fn(StreamEvent) + Send + Sync,
{
    fn on_event(&self, event: StreamEvent) {
        self(event)
    }
}

/// Client half of a duplex stream.
pub trait OutboundStream: Send + Sync {
    /// Queue one telemetry snapshot. Never blocks.
    fn send(&self, state: MissileState) -> Result<(), TransportError>;

    /// Signal that no more telemetry will follow. Queued snapshots are
    /// still delivered. Idempotent.
    fn complete(&self);
}

/// A reusable connection to one guidance server.
pub trait Channel: Send + Sync {
    /// The address this channel talks to.
    fn endpoint(&self) -> &str;

    /// No-payload liveness request.
    fn health_check(&self, deadline: Duration) -> Result<(), TransportError>;

    /// Registration call: send the missile identity, receive the
    /// server's hardware selection.
    fn register_missile(
        &self,
        missile: &Missile,
        deadline: Duration,
    ) -> Result<HardwareConfig, TransportError>;

    /// Open a duplex guidance stream for `missile`.
    ///
    /// Returns as soon as the stream is queued for opening; connection
    /// failures surface later as [`StreamEvent::Failed`].
    fn open_stream(
        &self,
        missile: &Missile,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<Box<dyn OutboundStream>, TransportError>;
}

/// Factory for channels.
pub trait Transport: Send + Sync {
    /// Create a channel for `endpoint`. Performs no I/O.
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Channel>, TransportError>;
}
