//! The boundary to the host simulation.
//!
//! The flight loop never reaches into host internals. Everything it
//! needs from the world (spatial queries, movement with collision,
//! visible effects) goes through [`HostWorld`].

use std::fmt;

use homing_core::{EntityId, MissileId, Vec3};

/// Ticks a newly locked target stays highlighted (20 s at 20 Hz).
pub const HIGHLIGHT_TICKS: u32 = 400;

/// Snapshot of a host entity a seeker may consider.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedEntity {
    /// Host identity.
    pub id: EntityId,
    /// Entity type name, matched by [`CandidateFilter::EntityType`](crate::profile::CandidateFilter::EntityType).
    pub kind: String,
    /// Feet position.
    pub position: Vec3,
    /// Eye position; line of sight is checked against this point.
    pub eye_position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
    /// Whether the entity is alive.
    pub living: bool,
}

/// What the host reported after moving a missile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    /// Where the missile ended up.
    pub position: Vec3,
    /// Set when the move hit a block or an entity.
    pub impact: Option<Impact>,
}

/// What a missile ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Impact {
    /// Solid terrain.
    Terrain,
    /// Another entity.
    Entity(EntityId),
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terrain => write!(f, "terrain"),
            Self::Entity(id) => write!(f, "entity {id}"),
        }
    }
}

/// Host simulation services used by the flight loop.
pub trait HostWorld {
    /// Entities inside the axis-aligned cube centred on `center` with
    /// half-width `half_extent`.
    fn entities_within(&self, center: Vec3, half_extent: f64) -> Vec<TrackedEntity>;

    /// Current snapshot of one entity, `None` once it is gone.
    fn entity(&self, id: EntityId) -> Option<TrackedEntity>;

    /// Whether the straight segment from `from` to `to` is free of
    /// solid obstruction.
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;

    /// Move a missile by `displacement`, resolving collisions.
    fn move_missile(&mut self, missile: MissileId, from: Vec3, displacement: Vec3) -> Motion;

    /// Play the launch sound and effects.
    fn launch_effects(&mut self, missile: MissileId, position: Vec3);

    /// Create an explosion.
    fn detonate(&mut self, missile: MissileId, position: Vec3, power: f64);

    /// Mark `entity` as visibly locked for `ticks` ticks.
    fn highlight(&mut self, entity: EntityId, ticks: u32);

    /// Remove the missile entity from the world.
    fn discard(&mut self, missile: MissileId);
}
