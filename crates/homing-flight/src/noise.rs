//! Seeded Gaussian noise for flight and sensor models.
//!
//! Every missile owns one [`GaussianNoise`] seeded from the driver's
//! RNG, so a flight replays identically for the same seed.

use homing_core::Vec3;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Zero-mean Gaussian source.
#[derive(Clone, Debug)]
pub struct GaussianNoise {
    rng: ChaCha8Rng,
}

impl GaussianNoise {
    /// A source seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// One standard normal sample (Box-Muller transform).
    pub fn standard(&mut self) -> f64 {
        let u1: f64 = self.rng.random::<f64>().max(1e-300); // avoid ln(0)
        let u2: f64 = self.rng.random();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// One sample with standard deviation `std_dev`.
    ///
    /// Exactly zero, and no randomness consumed, when `std_dev` is zero.
    pub fn sample(&mut self, std_dev: f64) -> f64 {
        if std_dev == 0.0 {
            return 0.0;
        }
        self.standard() * std_dev
    }

    /// `v` with independent noise added to each component.
    pub fn jitter(&mut self, v: Vec3, std_dev: f64) -> Vec3 {
        if std_dev == 0.0 {
            return v;
        }
        Vec3::new(
            v.x + self.standard() * std_dev,
            v.y + self.standard() * std_dev,
            v.z + self.standard() * std_dev,
        )
    }

    /// Raw 64 random bits, used to seed per-missile sources.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Raw 32 random bits, used for missile ids.
    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }
}
