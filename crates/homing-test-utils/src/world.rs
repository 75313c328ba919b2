//! Mock host world.
//!
//! Entities are plain snapshots a test moves around by hand. Terrain is
//! an optional ground plane plus axis-aligned box obstacles; both block
//! line of sight and stop missiles.

use homing_core::{EntityId, MissileId, Vec3};
use homing_flight::{HostWorld, Impact, Motion, TrackedEntity};
use indexmap::IndexMap;

/// Distance at which a missile hits an entity.
pub const HIT_RADIUS: f64 = 0.75;

/// Axis-aligned solid box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    pub min: Vec3,
    pub max: Vec3,
}

impl Obstacle {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Whether the segment `from..=to` passes through the box (slab test).
    pub fn blocks(&self, from: Vec3, to: Vec3) -> bool {
        let d = to - from;
        let mut t_min: f64 = 0.0;
        let mut t_max: f64 = 1.0;
        for (o, dir, lo, hi) in [
            (from.x, d.x, self.min.x, self.max.x),
            (from.y, d.y, self.min.y, self.max.y),
            (from.z, d.z, self.min.z, self.max.z),
        ] {
            if dir.abs() < 1e-12 {
                if o < lo || o > hi {
                    return false;
                }
                continue;
            }
            let (mut t0, mut t1) = ((lo - o) / dir, (hi - o) / dir);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Recorded side effect of a missile on the world.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    Launched(MissileId, Vec3),
    Detonated(MissileId, Vec3, f64),
    Highlighted(EntityId, u32),
    Discarded(MissileId),
}

/// In-memory [`HostWorld`].
#[derive(Clone, Debug, Default)]
pub struct MockWorld {
    entities: IndexMap<EntityId, TrackedEntity>,
    obstacles: Vec<Obstacle>,
    ground: Option<f64>,
    events: Vec<WorldEvent>,
    moves: usize,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solid ground at height `y`.
    pub fn with_ground(mut self, y: f64) -> Self {
        self.ground = Some(y);
        self
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    pub fn add_entity(&mut self, entity: TrackedEntity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<TrackedEntity> {
        self.entities.shift_remove(&id)
    }

    /// Move an entity, keeping its eye height.
    pub fn place_entity(&mut self, id: EntityId, position: Vec3) {
        if let Some(e) = self.entities.get_mut(&id) {
            let eye = e.eye_position - e.position;
            e.position = position;
            e.eye_position = position + eye;
        }
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn detonations(&self) -> Vec<(MissileId, f64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorldEvent::Detonated(id, _, power) => Some((*id, *power)),
                _ => None,
            })
            .collect()
    }

    pub fn highlights(&self) -> Vec<EntityId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorldEvent::Highlighted(id, _) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn discarded(&self) -> Vec<MissileId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorldEvent::Discarded(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Number of `move_missile` calls.
    pub fn moves(&self) -> usize {
        self.moves
    }

    fn terrain_blocks(&self, from: Vec3, to: Vec3) -> bool {
        if let Some(ground) = self.ground {
            if from.y < ground || to.y < ground {
                return true;
            }
        }
        self.obstacles.iter().any(|o| o.blocks(from, to))
    }
}

impl HostWorld for MockWorld {
    fn entities_within(&self, center: Vec3, half_extent: f64) -> Vec<TrackedEntity> {
        self.entities
            .values()
            .filter(|e| {
                (e.position.x - center.x).abs() <= half_extent
                    && (e.position.y - center.y).abs() <= half_extent
                    && (e.position.z - center.z).abs() <= half_extent
            })
            .cloned()
            .collect()
    }

    fn entity(&self, id: EntityId) -> Option<TrackedEntity> {
        self.entities.get(&id).cloned()
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        !self.terrain_blocks(from, to)
    }

    fn move_missile(&mut self, _missile: MissileId, from: Vec3, displacement: Vec3) -> Motion {
        self.moves += 1;
        let to = from + displacement;
        if self.terrain_blocks(from, to) {
            // Stop where we started; the caller detonates.
            return Motion {
                position: from,
                impact: Some(Impact::Terrain),
            };
        }
        let hit = self
            .entities
            .values()
            .find(|e| e.position.distance_squared(to) <= HIT_RADIUS * HIT_RADIUS);
        Motion {
            position: to,
            impact: hit.map(|e| Impact::Entity(e.id)),
        }
    }

    fn launch_effects(&mut self, missile: MissileId, position: Vec3) {
        self.events.push(WorldEvent::Launched(missile, position));
    }

    fn detonate(&mut self, missile: MissileId, position: Vec3, power: f64) {
        self.events.push(WorldEvent::Detonated(missile, position, power));
    }

    fn highlight(&mut self, entity: EntityId, ticks: u32) {
        self.events.push(WorldEvent::Highlighted(entity, ticks));
    }

    fn discard(&mut self, missile: MissileId) {
        self.events.push(WorldEvent::Discarded(missile));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_test_hits_and_misses() {
        let wall = Obstacle::new(Vec3::new(-5.0, 0.0, 10.0), Vec3::new(5.0, 10.0, 11.0));
        assert!(wall.blocks(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 5.0, 20.0)));
        assert!(!wall.blocks(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 5.0, 9.0)));
        assert!(!wall.blocks(Vec3::new(0.0, 15.0, 0.0), Vec3::new(0.0, 15.0, 20.0)));
    }

    #[test]
    fn ground_stops_missiles() {
        let mut world = MockWorld::new().with_ground(0.0);
        let motion = world.move_missile(
            MissileId(1),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -2.0, 0.0),
        );
        assert_eq!(motion.impact, Some(Impact::Terrain));
    }
}
