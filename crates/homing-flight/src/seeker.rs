//! Target acquisition and tracking.
//!
//! Acquisition runs at launch and then once per tick until it locks.
//! A lock is never reassigned. Once locked, only line of sight is
//! re-checked each tick to decide whether the target is reported.

use homing_core::{EntityId, Vec3};
use smallvec::SmallVec;

use crate::host::{HostWorld, TrackedEntity};
use crate::noise::GaussianNoise;
use crate::profile::SeekerHead;

/// Standard deviations applied to a visible target's reported state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackingNoise {
    /// Position noise.
    pub position: f64,
    /// Velocity noise.
    pub velocity: f64,
}

impl From<&SeekerHead> for TrackingNoise {
    fn from(seeker: &SeekerHead) -> Self {
        Self {
            position: seeker.target_position_variance,
            velocity: seeker.target_velocity_variance,
        }
    }
}

/// What the seeker reports about its locked target this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TargetReport {
    /// Whether the target is in line of sight.
    pub visible: bool,
    /// Noised target position, present when visible.
    pub position: Option<Vec3>,
    /// Noised target velocity, present when visible.
    pub velocity: Option<Vec3>,
}

/// Pick the candidate closest to `heading`, whose heading dot product
/// is at least `min_dot` (see [`SeekerHead::min_dot`]).
///
/// Ties go to the candidate seen last.
pub fn select_min_angle<'a, I>(
    origin: Vec3,
    heading: Vec3,
    min_dot: f64,
    candidates: I,
) -> Option<&'a TrackedEntity>
where
    I: IntoIterator<Item = &'a TrackedEntity>,
{
    let heading = heading.normalize();
    let mut max_dot = min_dot;
    let mut best = None;
    for candidate in candidates {
        let to_target = (candidate.position - origin).normalize();
        let dot = heading.dot(to_target);
        if dot >= max_dot {
            max_dot = dot;
            best = Some(candidate);
        }
    }
    best
}

/// Scan the world around `position` for a target to lock.
///
/// Candidates must pass the seeker's filter, be strictly within range,
/// be in line of sight of their eye position and not be `owner`.
pub fn acquire<W: HostWorld + ?Sized>(
    world: &W,
    position: Vec3,
    heading: Vec3,
    seeker: &SeekerHead,
    owner: Option<EntityId>,
) -> Option<TrackedEntity> {
    let range_sq = seeker.range * seeker.range;
    let candidates: SmallVec<[TrackedEntity; 8]> = world
        .entities_within(position, seeker.range)
        .into_iter()
        .filter(|e| Some(e.id) != owner)
        .filter(|e| seeker.filter.accepts(e))
        // The search volume is a cube; drop its corners.
        .filter(|e| position.distance_squared(e.position) < range_sq)
        .filter(|e| world.line_of_sight(position, e.eye_position))
        .collect();
    log::trace!("seeker sees {} candidate(s)", candidates.len());
    select_min_angle(position, heading, seeker.min_dot(), &candidates).cloned()
}

/// Report on the locked `target` as seen from `position`.
pub fn track<W: HostWorld + ?Sized>(
    world: &W,
    position: Vec3,
    target: EntityId,
    noise_std: TrackingNoise,
    noise: &mut GaussianNoise,
) -> TargetReport {
    let Some(entity) = world.entity(target) else {
        return TargetReport::default();
    };
    if !world.line_of_sight(position, entity.eye_position) {
        return TargetReport::default();
    }
    TargetReport {
        visible: true,
        position: Some(noise.jitter(entity.position, noise_std.position)),
        velocity: Some(noise.jitter(entity.velocity, noise_std.velocity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Motion;
    use crate::profile::CandidateFilter;
    use homing_core::MissileId;

    fn at_angle(id: u64, deg: f64, distance: f64) -> TrackedEntity {
        // Heading is +z; rotate around the vertical axis.
        let position = Vec3::from_pitch_yaw(0.0, deg) * distance;
        TrackedEntity {
            id: EntityId(id),
            kind: "zombie".into(),
            position,
            eye_position: position + Vec3::new(0.0, 1.6, 0.0),
            velocity: Vec3::ZERO,
            living: true,
        }
    }

    fn seeker() -> SeekerHead {
        SeekerHead {
            fov_deg: 20.0,
            range: 200.0,
            target_position_variance: 0.0,
            target_velocity_variance: 0.0,
            filter: CandidateFilter::AnyLiving,
        }
    }

    /// Open field with no obstructions except a wall at `z == wall`.
    struct Field {
        entities: Vec<TrackedEntity>,
        wall: Option<f64>,
    }

    impl HostWorld for Field {
        fn entities_within(&self, center: Vec3, half: f64) -> Vec<TrackedEntity> {
            self.entities
                .iter()
                .filter(|e| {
                    (e.position.x - center.x).abs() <= half
                        && (e.position.y - center.y).abs() <= half
                        && (e.position.z - center.z).abs() <= half
                })
                .cloned()
                .collect()
        }
        fn entity(&self, id: EntityId) -> Option<TrackedEntity> {
            self.entities.iter().find(|e| e.id == id).cloned()
        }
        fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
            match self.wall {
                Some(z) => (from.z < z) == (to.z < z),
                None => true,
            }
        }
        fn move_missile(&mut self, _: MissileId, from: Vec3, d: Vec3) -> Motion {
            Motion {
                position: from + d,
                impact: None,
            }
        }
        fn launch_effects(&mut self, _: MissileId, _: Vec3) {}
        fn detonate(&mut self, _: MissileId, _: Vec3, _: f64) {}
        fn highlight(&mut self, _: EntityId, _: u32) {}
        fn discard(&mut self, _: MissileId) {}
    }

    const HEADING: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    // ── Selection tests ─────────────────────────────────────────

    #[test]
    fn narrower_angle_wins() {
        let candidates = [at_angle(1, 5.0, 50.0), at_angle(2, 25.0, 50.0)];
        let min_dot = seeker().min_dot();
        let best = select_min_angle(Vec3::ZERO, HEADING, min_dot, &candidates).unwrap();
        assert_eq!(best.id, EntityId(1));
    }

    #[test]
    fn outside_fov_is_never_selected() {
        let candidates = [at_angle(2, 25.0, 50.0)];
        let min_dot = seeker().min_dot();
        assert!(select_min_angle(Vec3::ZERO, HEADING, min_dot, &candidates).is_none());
    }

    #[test]
    fn ties_go_to_last_seen() {
        let candidates = [at_angle(1, 10.0, 50.0), at_angle(2, 10.0, 50.0)];
        let min_dot = seeker().min_dot();
        let best = select_min_angle(Vec3::ZERO, HEADING, min_dot, &candidates).unwrap();
        assert_eq!(best.id, EntityId(2));
    }

    // ── Acquisition tests ───────────────────────────────────────

    #[test]
    fn acquire_prefers_smaller_angle() {
        let world = Field {
            entities: vec![at_angle(1, 5.0, 50.0), at_angle(2, 25.0, 50.0)],
            wall: None,
        };
        let lock = acquire(&world, Vec3::ZERO, HEADING, &seeker(), None).unwrap();
        assert_eq!(lock.id, EntityId(1));

        let world = Field {
            entities: vec![at_angle(2, 25.0, 50.0)],
            wall: None,
        };
        assert!(acquire(&world, Vec3::ZERO, HEADING, &seeker(), None).is_none());
    }

    #[test]
    fn acquire_skips_owner_dead_and_cube_corners() {
        let mut dead = at_angle(3, 0.0, 20.0);
        dead.living = false;
        // Inside the search cube, outside the range sphere.
        let corner = TrackedEntity {
            position: Vec3::new(150.0, 0.0, 150.0),
            eye_position: Vec3::new(150.0, 1.6, 150.0),
            ..at_angle(4, 0.0, 1.0)
        };
        let world = Field {
            entities: vec![at_angle(1, 0.0, 10.0), dead, corner],
            wall: None,
        };
        assert!(acquire(&world, Vec3::ZERO, HEADING, &seeker(), Some(EntityId(1))).is_none());
    }

    #[test]
    fn acquire_requires_line_of_sight() {
        let world = Field {
            entities: vec![at_angle(1, 0.0, 50.0)],
            wall: Some(25.0),
        };
        assert!(acquire(&world, Vec3::ZERO, HEADING, &seeker(), None).is_none());
    }

    #[test]
    fn typed_filter_ignores_other_kinds() {
        let mut typed = seeker();
        typed.filter = CandidateFilter::EntityType("phantom".into());
        let world = Field {
            entities: vec![at_angle(1, 0.0, 50.0)],
            wall: None,
        };
        assert!(acquire(&world, Vec3::ZERO, HEADING, &typed, None).is_none());
    }

    // ── Tracking tests ──────────────────────────────────────────

    #[test]
    fn track_reports_only_when_visible() {
        let mut noise = GaussianNoise::seeded(0);
        let target = at_angle(1, 0.0, 50.0);
        let open = Field {
            entities: vec![target.clone()],
            wall: None,
        };
        let report = track(
            &open,
            Vec3::ZERO,
            EntityId(1),
            TrackingNoise::default(),
            &mut noise,
        );
        assert!(report.visible);
        assert_eq!(report.position, Some(target.position));

        let walled = Field {
            entities: vec![target],
            wall: Some(25.0),
        };
        let report = track(
            &walled,
            Vec3::ZERO,
            EntityId(1),
            TrackingNoise::default(),
            &mut noise,
        );
        assert_eq!(report, TargetReport::default());
    }
}
