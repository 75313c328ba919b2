//! Flight dynamics integrator.
//!
//! One call to [`integrate`] advances attitude and velocity by one tick:
//!
//! ```text
//! attitude += N(0, rotation_variance)           (skipped on tick <= 1)
//! heading   = unit(pitch, yaw)
//! acc       = GRAVITY + heading * curve(tick) * (1 + N(0, rel_variance))
//! velocity  = (velocity + acc) * (1 - drag)
//! ```
//!
//! Moving the missile by the returned velocity is left to the host,
//! which resolves collisions.

use homing_core::{TickId, Vec3};

use crate::noise::GaussianNoise;
use crate::profile::HardwareProfile;

/// Constant downward acceleration per tick.
pub const GRAVITY: Vec3 = Vec3::new(0.0, -0.2, 0.0);

/// Orientation in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attitude {
    /// Degrees above the horizon.
    pub pitch: f64,
    /// Degrees around the vertical axis.
    pub yaw: f64,
}

impl Attitude {
    /// Attitude pointing along `direction`, or level if it has none.
    pub fn along(direction: Vec3) -> Self {
        match direction.pitch_yaw() {
            Some((pitch, yaw)) => Self { pitch, yaw },
            None => Self::default(),
        }
    }

    /// Unit vector this attitude points along.
    pub fn heading(&self) -> Vec3 {
        Vec3::from_pitch_yaw(self.pitch, self.yaw)
    }

    /// Add a turn.
    pub fn turn(&mut self, pitch: f64, yaw: f64) {
        self.pitch += pitch;
        self.yaw += yaw;
    }
}

/// Advance `attitude` by one tick of drift and return the new velocity.
pub fn integrate(
    profile: &HardwareProfile,
    tick: TickId,
    attitude: &mut Attitude,
    velocity: Vec3,
    noise: &mut GaussianNoise,
) -> Vec3 {
    // Keep the first post-launch tick steady so the seeker gets a clean look.
    if tick.0 > 1 {
        let pitch = noise.sample(profile.rotation_variance);
        let yaw = noise.sample(profile.rotation_variance);
        attitude.turn(pitch, yaw);
    }

    let thrust = profile.acceleration.at(tick)
        * (1.0 + noise.sample(profile.acceleration_rel_variance));
    let acc = GRAVITY + attitude.heading() * thrust;
    let next = (velocity + acc) * (1.0 - profile.drag);
    log::trace!("tick {tick}: thrust {thrust:.4}, velocity {next:?}");
    next
}
