//! Hardware profiles derived from a named part selection.
//!
//! A [`HardwareConfig`] names one part per slot. [`HardwareProfile`]
//! resolves those names once into the numbers the integrator and the
//! seeker read every tick, plus the total cost checked against the
//! missile's budget.

use std::error::Error;
use std::fmt;

use homing_core::{
    Airframe, Battery, HardwareConfig, InertialSystem, Motor, Seeker, TickId, Warhead,
};

use crate::host::TrackedEntity;

// ── AccelerationCurve ────────────────────────────────────────────

/// Thrust magnitude as a function of the tick count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AccelerationCurve {
    /// `thrust` for every tick below `cutoff`, zero afterwards.
    Step {
        /// Thrust per tick while the motor burns.
        thrust: f64,
        /// First tick without thrust.
        cutoff: u64,
    },
}

impl AccelerationCurve {
    /// Thrust on `tick`.
    pub fn at(&self, tick: TickId) -> f64 {
        match *self {
            Self::Step { thrust, cutoff } => {
                if tick.0 < cutoff {
                    thrust
                } else {
                    0.0
                }
            }
        }
    }
}

// ── CandidateFilter ──────────────────────────────────────────────

/// Which entities a seeker considers.
///
/// Resolved once from the configured entity type name, so the seeker
/// never looks a filter up by name during flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateFilter {
    /// Any living entity.
    AnyLiving,
    /// Entities whose kind equals this name, living or not.
    EntityType(String),
}

impl CandidateFilter {
    /// Resolve a configured type name. `None` or empty means any
    /// living entity.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            None | Some("") => Self::AnyLiving,
            Some(kind) => Self::EntityType(kind.to_string()),
        }
    }

    /// Whether `entity` passes the filter.
    pub fn accepts(&self, entity: &TrackedEntity) -> bool {
        match self {
            Self::AnyLiving => entity.living,
            Self::EntityType(kind) => entity.kind == *kind,
        }
    }
}

// ── SeekerHead ───────────────────────────────────────────────────

/// Parameters of a target-seeking head.
#[derive(Clone, Debug, PartialEq)]
pub struct SeekerHead {
    /// Half-angle of the field of view, in degrees.
    pub fov_deg: f64,
    /// Maximum detection distance.
    pub range: f64,
    /// Standard deviation of the reported target position.
    pub target_position_variance: f64,
    /// Standard deviation of the reported target velocity.
    pub target_velocity_variance: f64,
    /// Candidate selection.
    pub filter: CandidateFilter,
}

impl SeekerHead {
    /// Smallest heading dot product a candidate may have.
    pub fn min_dot(&self) -> f64 {
        self.fov_deg.to_radians().cos()
    }
}

// ── ProfileError ─────────────────────────────────────────────────

/// A requested hardware selection was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileError {
    /// The selection costs more than the missile may carry.
    OverBudget {
        /// Total cost of the selection.
        cost: u32,
        /// The missile's budget.
        budget: u32,
    },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverBudget { cost, budget } => {
                write!(f, "hardware costs {cost}, budget only {budget}")
            }
        }
    }
}

impl Error for ProfileError {}

// ── HardwareProfile ──────────────────────────────────────────────

/// Resolved flight, seeker and warhead parameters of one missile.
#[derive(Clone, Debug, PartialEq)]
pub struct HardwareProfile {
    /// The selection this profile was resolved from.
    pub config: HardwareConfig,
    /// Total cost of the selection.
    pub cost: u32,
    /// Tick on which the missile detonates regardless of guidance.
    pub time_to_live: u64,
    /// Fraction of velocity lost per tick.
    pub drag: f64,
    /// Motor thrust over time.
    pub acceleration: AccelerationCurve,
    /// Relative standard deviation of the thrust.
    pub acceleration_rel_variance: f64,
    /// Largest turn, in degrees, applied per tick.
    pub max_rotation_input: f64,
    /// Standard deviation, in degrees, of the per-tick attitude drift.
    pub rotation_variance: f64,
    /// Standard deviation of reported positions.
    pub position_variance: f64,
    /// Standard deviation of reported velocities.
    pub velocity_variance: f64,
    /// Standard deviation, in degrees, of reported pitch and yaw.
    pub heading_variance: f64,
    /// Seeker head, if fitted.
    pub seeker: Option<SeekerHead>,
    /// Explosion power, if the warhead detonates.
    pub detonation_power: Option<f64>,
}

impl HardwareProfile {
    /// Resolve every part of `config`.
    pub fn from_config(config: &HardwareConfig) -> Self {
        let (warhead_cost, detonation_power) = match config.warhead {
            Warhead::Blank => (0, None),
            Warhead::TntM => (500, Some(6.0)),
        };
        let (airframe_cost, drag, max_rotation_input, rotation_variance) = match config.airframe
        {
            Airframe::DefaultAirframe => (50, 0.05, 10.0, 8.0),
        };
        let (motor_cost, acceleration, acceleration_rel_variance) = match config.motor {
            Motor::SingleStageM => (
                50,
                AccelerationCurve::Step {
                    thrust: 0.4,
                    cutoff: 60,
                },
                0.01,
            ),
        };
        let (battery_cost, time_to_live) = match config.battery {
            Battery::LiIonM => (50, 200),
        };
        let (seeker_cost, seeker) = match config.seeker {
            Seeker::NoSeeker => (0, None),
            Seeker::IrSeekerM => (
                500,
                Some(SeekerHead {
                    fov_deg: 20.0,
                    range: 200.0,
                    target_position_variance: 0.0,
                    target_velocity_variance: 0.0,
                    filter: CandidateFilter::from_name(config.seeker_target.as_deref()),
                }),
            ),
        };
        let (imu_cost, position_variance, velocity_variance, heading_variance) =
            match config.inertial_system {
                InertialSystem::DefaultImu => (0, 0.0, 0.0, 0.0),
            };

        Self {
            config: config.clone(),
            cost: warhead_cost + airframe_cost + motor_cost + battery_cost + seeker_cost + imu_cost,
            time_to_live,
            drag,
            acceleration,
            acceleration_rel_variance,
            max_rotation_input,
            rotation_variance,
            position_variance,
            velocity_variance,
            heading_variance,
            seeker,
            detonation_power,
        }
    }

    /// Resolve `config`, rejecting it if it costs more than `budget`.
    pub fn within_budget(config: &HardwareConfig, budget: u32) -> Result<Self, ProfileError> {
        let profile = Self::from_config(config);
        if profile.cost > budget {
            return Err(ProfileError::OverBudget {
                cost: profile.cost,
                budget,
            });
        }
        Ok(profile)
    }

    /// Whether the warhead produces an explosion.
    pub fn detonates(&self) -> bool {
        self.detonation_power.is_some()
    }
}

impl Default for HardwareProfile {
    /// The launch profile. Every missile starts with it, whatever its
    /// budget.
    fn default() -> Self {
        Self::from_config(&HardwareConfig::default())
    }
}

/// Replace `profile` with the `requested` selection if it fits `budget`.
///
/// On rejection `profile` is left untouched and a warning is logged;
/// the error is returned for callers that want to count rejections.
pub fn reconfigure(
    profile: &mut HardwareProfile,
    requested: &HardwareConfig,
    budget: u32,
) -> Result<(), ProfileError> {
    match HardwareProfile::within_budget(requested, budget) {
        Ok(next) => {
            log::info!(
                "loaded hardware {:?}/{:?} (cost {})",
                next.config.warhead,
                next.config.seeker,
                next.cost
            );
            *profile = next;
            Ok(())
        }
        Err(e) => {
            log::warn!("rejected hardware reconfiguration: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> HardwareConfig {
        HardwareConfig {
            warhead: Warhead::TntM,
            seeker: Seeker::IrSeekerM,
            ..HardwareConfig::default()
        }
    }

    // ── Catalogue tests ─────────────────────────────────────────

    #[test]
    fn default_profile_matches_catalogue() {
        let p = HardwareProfile::default();
        assert_eq!(p.cost, 150);
        assert_eq!(p.time_to_live, 200);
        assert_eq!(p.drag, 0.05);
        assert_eq!(p.max_rotation_input, 10.0);
        assert_eq!(p.rotation_variance, 8.0);
        assert_eq!(p.acceleration_rel_variance, 0.01);
        assert!(p.seeker.is_none());
        assert!(!p.detonates());
    }

    #[test]
    fn armed_profile_adds_warhead_and_seeker() {
        let p = HardwareProfile::from_config(&armed());
        assert_eq!(p.cost, 1_150);
        assert_eq!(p.detonation_power, Some(6.0));
        let seeker = p.seeker.unwrap();
        assert_eq!(seeker.fov_deg, 20.0);
        assert_eq!(seeker.range, 200.0);
        assert_eq!(seeker.filter, CandidateFilter::AnyLiving);
    }

    #[test]
    fn step_curve_cuts_off() {
        let curve = HardwareProfile::default().acceleration;
        assert_eq!(curve.at(TickId(0)), 0.4);
        assert_eq!(curve.at(TickId(59)), 0.4);
        assert_eq!(curve.at(TickId(60)), 0.0);
        assert_eq!(curve.at(TickId(500)), 0.0);
    }

    #[test]
    fn seeker_target_name_resolves_filter() {
        assert_eq!(CandidateFilter::from_name(None), CandidateFilter::AnyLiving);
        assert_eq!(CandidateFilter::from_name(Some("")), CandidateFilter::AnyLiving);
        assert_eq!(
            CandidateFilter::from_name(Some("phantom")),
            CandidateFilter::EntityType("phantom".into())
        );
    }

    #[test]
    fn min_dot_uses_degrees() {
        let p = HardwareProfile::from_config(&armed());
        let min = p.seeker.unwrap().min_dot();
        assert!((min - 20f64.to_radians().cos()).abs() < 1e-12);
    }

    // ── Budget tests ────────────────────────────────────────────

    #[test]
    fn over_budget_leaves_profile_unchanged() {
        let mut profile = HardwareProfile::default();
        let before = profile.clone();
        let err = reconfigure(&mut profile, &armed(), 1_000).unwrap_err();
        assert_eq!(
            err,
            ProfileError::OverBudget {
                cost: 1_150,
                budget: 1_000
            }
        );
        assert_eq!(profile, before);
    }

    #[test]
    fn exact_budget_is_accepted() {
        let mut profile = HardwareProfile::default();
        reconfigure(&mut profile, &armed(), 1_150).unwrap();
        assert!(profile.detonates());
        assert!(profile.seeker.is_some());
    }
}
