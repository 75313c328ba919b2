//! Newline-delimited JSON framing for the TCP transport.
//!
//! Every frame is one JSON object on one line, tagged by `"type"`.
//! Client frames: [`Frame::HealthCheck`], [`Frame::Register`],
//! [`Frame::OpenStream`], [`Frame::State`], [`Frame::CloseStream`].
//! Server frames: [`Frame::HealthOk`], [`Frame::Registered`],
//! [`Frame::Control`], [`Frame::Error`].

use std::io::{BufRead, Read, Write};

use homing_core::{ControlInput, HardwareConfig, Missile, MissileState, TransportError};
use serde::{Deserialize, Serialize};

/// Upper bound on one encoded frame. Longer lines are a protocol error.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// One protocol frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Liveness request (no payload).
    HealthCheck,
    /// Liveness reply.
    HealthOk,
    /// Registration request.
    Register {
        /// Identity of the missile being registered.
        missile: Missile,
    },
    /// Registration reply with the server's hardware choice.
    Registered {
        /// Selected hardware.
        hardware: HardwareConfig,
    },
    /// First frame of a guidance stream.
    OpenStream {
        /// Identity of the missile that owns the stream.
        missile: Missile,
    },
    /// Outbound telemetry.
    State {
        /// The snapshot.
        state: MissileState,
    },
    /// Inbound command.
    Control {
        /// The command.
        input: ControlInput,
    },
    /// Client half-close: no more telemetry will follow.
    CloseStream,
    /// Server-reported failure; terminates the exchange.
    Error {
        /// Human readable cause.
        reason: String,
    },
}

/// Encode a frame as one line, including the trailing newline.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, TransportError> {
    let mut buf = serde_json::to_vec(frame).map_err(|e| TransportError::Protocol {
        reason: format!("encode: {e}"),
    })?;
    buf.push(b'\n');
    Ok(buf)
}

/// Decode one line (with or without its trailing newline).
pub fn decode(line: &[u8]) -> Result<Frame, TransportError> {
    let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    serde_json::from_slice(trimmed).map_err(|e| TransportError::Protocol {
        reason: format!("decode: {e}"),
    })
}

/// Write one frame and flush.
pub fn write_frame<W: Write>(out: &mut W, frame: &Frame) -> Result<(), TransportError> {
    let bytes = encode(frame)?;
    out.write_all(&bytes)?;
    out.flush()?;
    Ok(())
}

/// Read the next frame. `Ok(None)` on a clean end of stream.
pub fn read_frame<R: BufRead>(input: &mut R) -> Result<Option<Frame>, TransportError> {
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = Read::take(&mut *input, MAX_FRAME_LEN as u64 + 1).read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        if line.len() > MAX_FRAME_LEN {
            return Err(TransportError::Protocol {
                reason: format!("frame exceeds {MAX_FRAME_LEN} bytes"),
            });
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        return decode(&line).map(Some);
    }
}
