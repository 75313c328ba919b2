//! Minimal 3-vector used for positions, velocities and headings.
//!
//! Axis convention: `y` is up. A heading is described by `pitch`
//! (degrees above the horizon) and `yaw` (degrees around the vertical
//! axis, 0 = +z, 90 = +x).

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A point or direction in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// East-west component.
    pub x: f64,
    /// Vertical component (up is positive).
    pub y: f64,
    /// North-south component.
    pub z: f64,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    /// Construct from components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Unit heading for the given pitch and yaw, both in degrees.
    pub fn from_pitch_yaw(pitch_deg: f64, yaw_deg: f64) -> Self {
        let pitch = pitch_deg.to_radians();
        let yaw = yaw_deg.to_radians();
        Self::new(
            yaw.sin() * pitch.cos(),
            pitch.sin(),
            yaw.cos() * pitch.cos(),
        )
    }

    /// Inverse of [`from_pitch_yaw`](Self::from_pitch_yaw).
    ///
    /// Returns `None` for the zero vector, which has no direction.
    pub fn pitch_yaw(self) -> Option<(f64, f64)> {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        let pitch = (self.y / len).clamp(-1.0, 1.0).asin().to_degrees();
        let yaw = self.x.atan2(self.z).to_degrees();
        Some((pitch, yaw))
    }

    /// Dot product.
    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared Euclidean length.
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    pub fn normalize(self) -> Vec3 {
        let len = self.length();
        if len < 1.0e-4 {
            Vec3::ZERO
        } else {
            self * (1.0 / len)
        }
    }

    /// Squared distance to another point.
    pub fn distance_squared(self, other: Vec3) -> f64 {
        (self - other).length_squared()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}
