//! Benchmark profiles and utilities for the Homing guidance bridge.
//!
//! - [`OpenField`]: terrain-free [`HostWorld`] holding a crowd of targets
//! - [`crowd`]: deterministic target placement via seed
//! - [`salvo`]: launch requests fanned out across connection ids
//! - [`QuietUplink`]: [`Uplink`] that accepts every session and discards
//!   telemetry, so flight benchmarks measure the flight loop alone

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicU64, Ordering};

use homing_core::{
    ConnectionId, Consumed, EntityId, HardwareConfig, Missile, MissileId, MissileState,
    TransportError, Uplink, Vec3,
};
use homing_flight::{HostWorld, LaunchRequest, LaunchTag, Motion, TrackedEntity};

/// Half-width of the square area [`crowd`] scatters targets over.
pub const FIELD_HALF_WIDTH: f64 = 100.0;

/// Height of the launch plane.
pub const LAUNCH_ALTITUDE: f64 = 64.0;

/// Generate `n` living targets at deterministic positions.
///
/// Positions come from a simple hash of the seed and are spread over the
/// square `±FIELD_HALF_WIDTH` in x and z, all ahead of the origin.
pub fn crowd(n: u64, seed: u64) -> Vec<TrackedEntity> {
    (0..n)
        .map(|i| {
            let h = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(i.wrapping_mul(1442695040888963407));
            let x = ((h >> 16) % 2000) as f64 / 10.0 - FIELD_HALF_WIDTH;
            let z = ((h >> 40) % 1000) as f64 / 10.0 + 5.0;
            let position = Vec3::new(x, LAUNCH_ALTITUDE, z);
            TrackedEntity {
                id: EntityId(i + 1),
                kind: "zombie".into(),
                position,
                eye_position: position + Vec3::new(0.0, 1.6, 0.0),
                velocity: Vec3::ZERO,
                living: true,
            }
        })
        .collect()
}

/// `n` launches from the origin along +z, round-robin over `connections`
/// connection ids.
pub fn salvo(n: usize, connections: u32, budget: u32) -> Vec<LaunchRequest> {
    (0..n)
        .map(|i| LaunchRequest {
            tag: LaunchTag {
                connection_id: ConnectionId(i as u32 % connections.max(1)),
                name: format!("bench-{i}"),
            },
            budget,
            position: Vec3::new(0.0, LAUNCH_ALTITUDE, 0.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
            launcher: None,
        })
        .collect()
}

// ── OpenField ────────────────────────────────────────────────────

/// Flat, obstacle-free world. Missiles never collide.
#[derive(Clone, Debug, Default)]
pub struct OpenField {
    entities: Vec<TrackedEntity>,
    detonations: u64,
}

impl OpenField {
    /// A field holding `entities`.
    pub fn new(entities: Vec<TrackedEntity>) -> Self {
        Self {
            entities,
            detonations: 0,
        }
    }

    /// Number of detonations requested so far.
    pub fn detonations(&self) -> u64 {
        self.detonations
    }
}

impl HostWorld for OpenField {
    fn entities_within(&self, center: Vec3, half_extent: f64) -> Vec<TrackedEntity> {
        self.entities
            .iter()
            .filter(|e| {
                (e.position.x - center.x).abs() <= half_extent
                    && (e.position.y - center.y).abs() <= half_extent
                    && (e.position.z - center.z).abs() <= half_extent
            })
            .cloned()
            .collect()
    }

    fn entity(&self, id: EntityId) -> Option<TrackedEntity> {
        self.entities.iter().find(|e| e.id == id).cloned()
    }

    fn line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
        true
    }

    fn move_missile(&mut self, _missile: MissileId, from: Vec3, displacement: Vec3) -> Motion {
        Motion {
            position: from + displacement,
            impact: None,
        }
    }

    fn launch_effects(&mut self, _missile: MissileId, _position: Vec3) {}

    fn detonate(&mut self, _missile: MissileId, _position: Vec3, _power: f64) {
        self.detonations += 1;
    }

    fn highlight(&mut self, _entity: EntityId, _ticks: u32) {}

    fn discard(&mut self, _missile: MissileId) {}
}

// ── QuietUplink ──────────────────────────────────────────────────

/// Uplink that only counts what passes through it.
#[derive(Debug, Default)]
pub struct QuietUplink {
    sent: AtomicU64,
    terminated: AtomicU64,
    hardware: HardwareConfig,
}

impl QuietUplink {
    /// An uplink whose negotiation always answers `hardware`.
    pub fn negotiating(hardware: HardwareConfig) -> Self {
        Self {
            hardware,
            ..Self::default()
        }
    }

    /// Telemetry snapshots received, initial states included.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Sessions terminated.
    pub fn terminated(&self) -> u64 {
        self.terminated.load(Ordering::Relaxed)
    }
}

impl Uplink for QuietUplink {
    fn establish(&self, _missile: &Missile, _initial: MissileState) -> bool {
        self.sent.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn send(&self, _state: MissileState) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn terminate(&self, _final_state: MissileState) -> bool {
        self.terminated.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn consume_latest(&self, _missile: MissileId) -> Consumed {
        Consumed::Empty
    }

    fn negotiate(&self, _missile: &Missile) -> Result<HardwareConfig, TransportError> {
        Ok(self.hardware.clone())
    }
}
