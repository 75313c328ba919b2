//! Wire messages exchanged with a guidance server.
//!
//! - [`Missile`] identifies a missile (sent on registration and stream open).
//! - [`MissileState`] is outbound telemetry, one per tick.
//! - [`ControlInput`] is an inbound command.
//! - [`HardwareConfig`] selects the missile's parts.

use serde::{Deserialize, Serialize};

use crate::id::{ConnectionId, MissileId, SequenceId, TickId};
use crate::vec3::Vec3;

/// Immutable identity of one missile.
///
/// Created once at launch and used as a map key for the whole session.
///
/// # Examples
///
/// ```
/// use homing_core::{ConnectionId, Missile, MissileId};
///
/// let missile = Missile {
///     id: MissileId(42),
///     name: "interceptor".into(),
///     connection_id: ConnectionId(1),
///     budget: 1_200,
/// };
/// assert_eq!(missile.connection_id, ConnectionId(1));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Missile {
    /// Random, non-negative id.
    pub id: MissileId,
    /// Display name chosen by whoever launched the missile.
    pub name: String,
    /// Which guidance server controls this missile.
    pub connection_id: ConnectionId,
    /// Maximum total hardware cost this missile may carry.
    pub budget: u32,
}

/// Outbound telemetry snapshot.
///
/// One is produced per tick while the missile flies, plus one final
/// snapshot with `destroyed == true`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissileState {
    /// The missile this snapshot describes.
    pub missile: MissileId,
    /// Tick the snapshot was taken on.
    pub tick: TickId,
    /// Reported position (possibly noised by the inertial system).
    pub position: Vec3,
    /// Reported velocity (possibly noised by the inertial system).
    pub velocity: Vec3,
    /// Reported pitch in degrees.
    pub pitch: f64,
    /// Reported yaw in degrees.
    pub yaw: f64,
    /// Set on the final snapshot only.
    pub destroyed: bool,
    /// Whether the seeker holds a lock.
    pub target_lock: bool,
    /// Whether the locked target is currently in line of sight.
    pub target_visible: bool,
    /// Seeker-reported target position, present when visible.
    pub target_position: Option<Vec3>,
    /// Seeker-reported target velocity, present when visible.
    pub target_velocity: Option<Vec3>,
}

impl MissileState {
    /// The final snapshot sent when a missile leaves the world.
    pub fn destroyed(missile: MissileId, tick: TickId) -> Self {
        Self {
            missile,
            tick,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            destroyed: true,
            target_lock: false,
            target_visible: false,
            target_position: None,
            target_velocity: None,
        }
    }
}

/// Inbound command from a guidance server.
///
/// Commands carry no timestamp; `sequence` is the sole ordering signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    /// Strictly increasing per stream.
    pub sequence: SequenceId,
    /// Requested pitch change in degrees for this tick.
    pub pitch_turn: f64,
    /// Requested yaw change in degrees for this tick.
    pub yaw_turn: f64,
    /// Detonate now.
    #[serde(default)]
    pub explode: bool,
    /// Remove the missile without detonating.
    #[serde(default)]
    pub disarm: bool,
    /// Hardware selection, honoured only right after launch.
    #[serde(default)]
    pub hardware: Option<HardwareConfig>,
}

impl ControlInput {
    /// A plain steering command.
    pub fn turn(sequence: u64, pitch_turn: f64, yaw_turn: f64) -> Self {
        Self {
            sequence: SequenceId(sequence),
            pitch_turn,
            yaw_turn,
            explode: false,
            disarm: false,
            hardware: None,
        }
    }
}

/// Warhead selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Warhead {
    /// Inert.
    #[default]
    Blank,
    /// Medium high-explosive charge.
    TntM,
}

/// Airframe selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Airframe {
    /// Standard airframe.
    #[default]
    DefaultAirframe,
}

/// Motor selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Motor {
    /// Medium single-stage motor.
    #[default]
    SingleStageM,
}

/// Battery selection; governs time-to-live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Battery {
    /// Medium lithium-ion pack.
    #[default]
    LiIonM,
}

/// Seeker head selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Seeker {
    /// No seeker; the missile never locks.
    #[default]
    NoSeeker,
    /// Medium infrared seeker.
    IrSeekerM,
}

/// Inertial measurement selection; governs telemetry noise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InertialSystem {
    /// Noise-free reference unit.
    #[default]
    DefaultImu,
}

/// A named hardware selection, as sent by a guidance server.
///
/// The `Default` selection is the cheapest airworthy missile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Warhead part.
    #[serde(default)]
    pub warhead: Warhead,
    /// Airframe part.
    #[serde(default)]
    pub airframe: Airframe,
    /// Motor part.
    #[serde(default)]
    pub motor: Motor,
    /// Battery part.
    #[serde(default)]
    pub battery: Battery,
    /// Seeker part.
    #[serde(default)]
    pub seeker: Seeker,
    /// Inertial system part.
    #[serde(default)]
    pub inertial_system: InertialSystem,
    /// Entity type the seeker should look for. `None` or empty means
    /// any living entity.
    #[serde(default)]
    pub seeker_target: Option<String>,
}
