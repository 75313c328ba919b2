//! Turning an inbound command into one action for this tick.

use homing_core::ControlInput;

/// What a command asks the missile to do this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Directive {
    /// Detonate now. Takes precedence over every other field.
    Explode,
    /// Leave the world without detonating.
    Disarm,
    /// Turn by the given (already clamped) degrees.
    Turn {
        /// Pitch change in degrees.
        pitch: f64,
        /// Yaw change in degrees.
        yaw: f64,
    },
}

/// Decide what `input` asks for, clamping turns to `max_rotation`.
pub fn interpret(input: &ControlInput, max_rotation: f64) -> Directive {
    if input.explode {
        return Directive::Explode;
    }
    if input.disarm {
        return Directive::Disarm;
    }
    let (pitch, yaw) = clamp_turn(input.pitch_turn, input.yaw_turn, max_rotation);
    Directive::Turn { pitch, yaw }
}

/// Scale the turn vector down to `max` without changing its direction.
pub fn clamp_turn(pitch: f64, yaw: f64, max: f64) -> (f64, f64) {
    let len = pitch.hypot(yaw);
    if len > max && len > 0.0 {
        let scale = max / len;
        (pitch * scale, yaw * scale)
    } else {
        (pitch, yaw)
    }
}
