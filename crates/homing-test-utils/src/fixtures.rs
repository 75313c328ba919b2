//! Reusable test fixtures.

use std::time::Duration;

use homing_core::{
    ConnectionId, EntityId, HardwareConfig, Missile, MissileId, MissileState, Seeker, TickId,
    Vec3, Warhead,
};
use homing_flight::{LaunchRequest, LaunchTag, TrackedEntity};
use homing_link::LinkConfig;

/// Budget of a creeper-charge build; affords every catalogued part.
pub const RICH_BUDGET: u32 = 30_075;

/// Eye height of the mock creatures.
pub const EYE_HEIGHT: f64 = 1.6;

pub fn missile(id: u32, connection: u32) -> Missile {
    Missile {
        id: MissileId(id),
        name: format!("test-{id}"),
        connection_id: ConnectionId(connection),
        budget: RICH_BUDGET,
    }
}

/// A plain in-flight telemetry snapshot.
pub fn state(id: u32, tick: u64) -> MissileState {
    MissileState {
        destroyed: false,
        position: Vec3::new(0.0, 64.0, tick as f64),
        ..MissileState::destroyed(MissileId(id), TickId(tick))
    }
}

/// Living creature standing at `position`.
pub fn creature(id: u64, position: Vec3) -> TrackedEntity {
    TrackedEntity {
        id: EntityId(id),
        kind: "zombie".into(),
        position,
        eye_position: position + Vec3::new(0.0, EYE_HEIGHT, 0.0),
        velocity: Vec3::ZERO,
        living: true,
    }
}

/// TNT warhead with an infrared seeker.
pub fn armed_hardware() -> HardwareConfig {
    HardwareConfig {
        warhead: Warhead::TntM,
        seeker: Seeker::IrSeekerM,
        ..HardwareConfig::default()
    }
}

/// A launch from `position` along +z with no launcher.
pub fn launch_request(connection: u32, budget: u32, position: Vec3) -> LaunchRequest {
    LaunchRequest {
        tag: LaunchTag {
            connection_id: ConnectionId(connection),
            name: "interceptor".into(),
        },
        budget,
        position,
        direction: Vec3::new(0.0, 0.0, 1.0),
        launcher: None,
    }
}

/// Link configuration with short timings for tests.
pub fn link_config(ids: &[u32]) -> LinkConfig {
    LinkConfig {
        connection_ids: ids.iter().copied().map(ConnectionId).collect(),
        probe_interval: Duration::from_secs(30),
        probe_deadline: Duration::from_millis(100),
        register_deadline: Duration::from_millis(100),
        teardown_timeout: Duration::from_millis(200),
        ..LinkConfig::default()
    }
}
