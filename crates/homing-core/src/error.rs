//! Error types shared across the guidance link.
//!
//! Transport failures are always recovered locally: the affected session
//! is discarded and the missile detonates as if commanded to. Nothing
//! here is ever propagated to the host as a crash.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Errors from a guidance transport (channel, stream or request).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The endpoint could not be reached.
    Unavailable {
        /// Address of the endpoint.
        endpoint: String,
        /// Underlying cause.
        reason: String,
    },
    /// A request did not complete within its deadline.
    DeadlineExceeded {
        /// The deadline that elapsed.
        deadline: Duration,
    },
    /// The stream was already closed when a send was attempted.
    StreamClosed,
    /// The outbound queue of a stream is full.
    Backpressure,
    /// An I/O error on an established connection.
    Io {
        /// Description of the failure.
        reason: String,
    },
    /// The peer sent something that is not a valid frame, or an
    /// unexpected frame.
    Protocol {
        /// Description of the violation.
        reason: String,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { endpoint, reason } => {
                write!(f, "endpoint {endpoint} unavailable: {reason}")
            }
            Self::DeadlineExceeded { deadline } => {
                write!(f, "deadline of {}ms exceeded", deadline.as_millis())
            }
            Self::StreamClosed => write!(f, "stream closed"),
            Self::Backpressure => write!(f, "outbound stream queue full"),
            Self::Io { reason } => write!(f, "i/o error: {reason}"),
            Self::Protocol { reason } => write!(f, "protocol error: {reason}"),
        }
    }
}

impl Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => Self::StreamClosed,
            _ => Self::Io {
                reason: e.to_string(),
            },
        }
    }
}
