//! Per-missile flight state machine.
//!
//! ```text
//! tick 0:  align with launch direction, inherit launcher velocity,
//!          try to lock, open the guidance session
//! tick n:  consume command -> (reconfigure on tick 1) -> explode | disarm | turn
//!          -> integrate -> move -> try to lock -> send telemetry
//!          -> impact? detonate -> time-to-live reached? detonate
//! ```
//!
//! The tick counter advances on every tick, including the one on which
//! the missile leaves the world.

use homing_core::{
    Consumed, EntityId, HardwareConfig, Missile, MissileId, MissileState, TickId, Uplink, Vec3,
};

use crate::control::{self, Directive};
use crate::dynamics::{self, Attitude};
use crate::host::{HostWorld, HIGHLIGHT_TICKS};
use crate::noise::GaussianNoise;
use crate::profile::{self, HardwareProfile, ProfileError};
use crate::seeker::{self, TargetReport, TrackingNoise};

// ── Launch parameters ────────────────────────────────────────────

/// The entity that fired a missile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Launcher {
    /// Host identity; never selected as a target.
    pub id: EntityId,
    /// Launcher velocity at the moment of firing.
    pub velocity: Vec3,
}

/// Where and how a missile left its launcher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Launch {
    /// Spawn position.
    pub position: Vec3,
    /// Direction the missile was fired in.
    pub direction: Vec3,
    /// Who fired it, if anyone.
    pub launcher: Option<Launcher>,
}

// ── Phase and outcomes ───────────────────────────────────────────

/// Why a missile left the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Its guidance server commanded detonation.
    Commanded,
    /// Its guidance server disarmed it.
    Disarmed,
    /// The guidance stream failed; treated as a detonation command.
    LinkLost,
    /// It hit something.
    Impact,
    /// It reached its time-to-live.
    Expired,
    /// The host removed it.
    Destroyed,
}

impl Termination {
    /// Whether the warhead goes off on this kind of exit.
    pub fn detonates(self) -> bool {
        !matches!(self, Self::Disarmed | Self::Destroyed)
    }
}

/// Where a missile is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlightPhase {
    /// Created, launch tick not run yet.
    Launching,
    /// In flight.
    Flying,
    /// Gone from the world.
    Terminated(Termination),
}

/// Result of one call to [`GuidedMissile::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The launch tick ran. `guided` is false when no session could be
    /// opened; the missile then flies unguided.
    Launched {
        /// Whether a guidance session was opened.
        guided: bool,
    },
    /// A flight tick ran and the missile is still in the world.
    Flying,
    /// The missile left the world on this tick.
    Terminated(Termination),
    /// The missile had already left the world; nothing happened.
    Inert,
}

// ── GuidedMissile ────────────────────────────────────────────────

/// One guided missile.
///
/// Owns its kinematic state, hardware profile, seeker lock and noise
/// source. All world interaction goes through a [`HostWorld`]; all
/// guidance traffic through an [`Uplink`].
#[derive(Debug)]
pub struct GuidedMissile {
    missile: Missile,
    launch: Launch,
    profile: HardwareProfile,
    tick: TickId,
    position: Vec3,
    velocity: Vec3,
    attitude: Attitude,
    lock: Option<EntityId>,
    noise: GaussianNoise,
    phase: FlightPhase,
}

impl GuidedMissile {
    /// A missile ready for its launch tick, carrying the default profile.
    pub fn new(missile: Missile, launch: Launch, noise: GaussianNoise) -> Self {
        Self {
            missile,
            position: launch.position,
            velocity: Vec3::ZERO,
            attitude: Attitude::along(launch.direction),
            launch,
            profile: HardwareProfile::default(),
            tick: TickId(0),
            lock: None,
            noise,
            phase: FlightPhase::Launching,
        }
    }

    /// Identity.
    pub fn missile(&self) -> &Missile {
        &self.missile
    }

    /// Missile id.
    pub fn id(&self) -> MissileId {
        self.missile.id
    }

    /// The next tick to run.
    pub fn tick_count(&self) -> TickId {
        self.tick
    }

    /// Current phase.
    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// Whether the missile has left the world.
    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, FlightPhase::Terminated(_))
    }

    /// True position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// True velocity.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// True attitude.
    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    /// Locked target, if any.
    pub fn lock(&self) -> Option<EntityId> {
        self.lock
    }

    /// Active hardware profile.
    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    /// Replace the hardware if `config` fits the budget.
    ///
    /// Used for hardware negotiated before launch. On rejection the
    /// current profile is kept.
    pub fn apply_hardware(&mut self, config: &HardwareConfig) -> Result<(), ProfileError> {
        profile::reconfigure(&mut self.profile, config, self.missile.budget)
    }

    /// Run one tick.
    pub fn tick<U, W>(&mut self, uplink: &U, world: &mut W) -> TickOutcome
    where
        U: Uplink + ?Sized,
        W: HostWorld + ?Sized,
    {
        let outcome = match self.phase {
            FlightPhase::Terminated(_) => return TickOutcome::Inert,
            FlightPhase::Launching => self.launch_tick(uplink, world),
            FlightPhase::Flying => self.flight_tick(uplink, world),
        };
        self.tick = self.tick.next();
        outcome
    }

    /// Detonate on a host trigger. No-op once terminated.
    pub fn explode<U, W>(&mut self, uplink: &U, world: &mut W) -> bool
    where
        U: Uplink + ?Sized,
        W: HostWorld + ?Sized,
    {
        self.leave(uplink, world, Termination::Commanded)
    }

    /// Remove without detonating on a host trigger. No-op once terminated.
    pub fn disarm<U, W>(&mut self, uplink: &U, world: &mut W) -> bool
    where
        U: Uplink + ?Sized,
        W: HostWorld + ?Sized,
    {
        self.leave(uplink, world, Termination::Disarmed)
    }

    /// The host already removed the missile; close its session.
    pub fn destroy<U: Uplink + ?Sized>(&mut self, uplink: &U) -> bool {
        if self.is_terminated() {
            return false;
        }
        uplink.terminate(MissileState::destroyed(self.missile.id, self.tick));
        self.phase = FlightPhase::Terminated(Termination::Destroyed);
        log::info!("missile {} destroyed by host", self.missile.id);
        true
    }

    fn launch_tick<U, W>(&mut self, uplink: &U, world: &mut W) -> TickOutcome
    where
        U: Uplink + ?Sized,
        W: HostWorld + ?Sized,
    {
        let id = self.missile.id;
        log::info!(
            "launching missile {id} ({}) on connection {}",
            self.missile.name,
            self.missile.connection_id
        );
        self.attitude = Attitude::along(self.launch.direction);
        world.launch_effects(id, self.position);

        let mut impact = None;
        match self.launch.launcher {
            Some(launcher) => {
                self.velocity = launcher.velocity;
                // Step ahead so a moving launcher does not fly into us.
                let motion = world.move_missile(id, self.position, launcher.velocity * 2.0);
                self.position = motion.position;
                self.velocity = launcher.velocity;
                impact = motion.impact;
            }
            None => self.velocity = Vec3::ZERO,
        }

        self.try_lock(world);
        let initial = self.telemetry(world);
        let guided = uplink.establish(&self.missile, initial);
        self.phase = FlightPhase::Flying;

        if let Some(impact) = impact {
            log::info!("missile {id} hit {impact} at launch");
            self.leave(uplink, world, Termination::Impact);
            return TickOutcome::Terminated(Termination::Impact);
        }
        TickOutcome::Launched { guided }
    }

    fn flight_tick<U, W>(&mut self, uplink: &U, world: &mut W) -> TickOutcome
    where
        U: Uplink + ?Sized,
        W: HostWorld + ?Sized,
    {
        let id = self.missile.id;
        log::debug!("missile {id} tick {}", self.tick);

        let consumed = uplink.consume_latest(id);
        if matches!(consumed, Consumed::LinkLost) {
            log::warn!("missile {id} lost its guidance link; detonating");
            self.leave(uplink, world, Termination::LinkLost);
            return TickOutcome::Terminated(Termination::LinkLost);
        }

        if let Some(command) = consumed.command() {
            if let Some(hardware) = &command.hardware {
                if self.tick == TickId(1) {
                    let _ = self.apply_hardware(hardware);
                } else {
                    log::debug!("missile {id} ignores hardware change after launch");
                }
            }
            match control::interpret(command, self.profile.max_rotation_input) {
                Directive::Explode => {
                    self.leave(uplink, world, Termination::Commanded);
                    return TickOutcome::Terminated(Termination::Commanded);
                }
                Directive::Disarm => {
                    self.leave(uplink, world, Termination::Disarmed);
                    return TickOutcome::Terminated(Termination::Disarmed);
                }
                Directive::Turn { pitch, yaw } => self.attitude.turn(pitch, yaw),
            }
        }

        let velocity = dynamics::integrate(
            &self.profile,
            self.tick,
            &mut self.attitude,
            self.velocity,
            &mut self.noise,
        );
        self.velocity = velocity;
        let motion = world.move_missile(id, self.position, velocity);
        self.position = motion.position;
        // The host may deflect on collision; the integrated value stands.
        self.velocity = velocity;

        self.try_lock(world);
        let state = self.telemetry(world);
        uplink.send(state);

        if let Some(impact) = motion.impact {
            log::info!("missile {id} hit {impact}");
            self.leave(uplink, world, Termination::Impact);
            return TickOutcome::Terminated(Termination::Impact);
        }
        if self.tick.0 >= self.profile.time_to_live {
            log::info!("missile {id} reached its time-to-live");
            self.leave(uplink, world, Termination::Expired);
            return TickOutcome::Terminated(Termination::Expired);
        }
        TickOutcome::Flying
    }

    /// Lock onto the best visible candidate, once.
    fn try_lock<W: HostWorld + ?Sized>(&mut self, world: &mut W) {
        if self.lock.is_some() {
            return;
        }
        let Some(seeker) = &self.profile.seeker else {
            return;
        };
        let owner = self.launch.launcher.map(|l| l.id);
        let heading = self.attitude.heading();
        if let Some(target) = seeker::acquire(&*world, self.position, heading, seeker, owner) {
            log::info!(
                "missile {} locked onto {} ({})",
                self.missile.id,
                target.id,
                target.kind
            );
            self.lock = Some(target.id);
            if target.living {
                world.highlight(target.id, HIGHLIGHT_TICKS);
            }
        }
    }

    /// Telemetry for the current tick, noised by the inertial system.
    fn telemetry<W: HostWorld + ?Sized>(&mut self, world: &W) -> MissileState {
        let p = &self.profile;
        let position = self.noise.jitter(self.position, p.position_variance);
        let velocity = self.noise.jitter(self.velocity, p.velocity_variance);
        let pitch = self.attitude.pitch + self.noise.sample(p.heading_variance);
        let yaw = self.attitude.yaw + self.noise.sample(p.heading_variance);

        let target = match self.lock {
            Some(target) => {
                let noise_std = p.seeker.as_ref().map(TrackingNoise::from).unwrap_or_default();
                seeker::track(world, self.position, target, noise_std, &mut self.noise)
            }
            None => TargetReport::default(),
        };

        MissileState {
            missile: self.missile.id,
            tick: self.tick,
            position,
            velocity,
            pitch,
            yaw,
            destroyed: false,
            target_lock: self.lock.is_some(),
            target_visible: target.visible,
            target_position: target.position,
            target_velocity: target.velocity,
        }
    }

    /// Leave the world: detonate if the exit calls for it and the warhead
    /// is live, send the final state and remove the entity.
    fn leave<U, W>(&mut self, uplink: &U, world: &mut W, reason: Termination) -> bool
    where
        U: Uplink + ?Sized,
        W: HostWorld + ?Sized,
    {
        if self.is_terminated() {
            return false;
        }
        let id = self.missile.id;
        if reason.detonates() {
            if let Some(power) = self.profile.detonation_power {
                world.detonate(id, self.position, power);
            }
        }
        uplink.terminate(MissileState::destroyed(id, self.tick));
        world.discard(id);
        self.phase = FlightPhase::Terminated(reason);
        log::info!("missile {id} left the world ({reason:?}) on tick {}", self.tick);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Impact, Motion, TrackedEntity};
    use homing_core::{ConnectionId, ControlInput, Seeker, TransportError, Warhead};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Uplink that replays scripted reads and records everything sent.
    #[derive(Default)]
    struct Script {
        reads: Mutex<VecDeque<Consumed>>,
        sent: Mutex<Vec<MissileState>>,
        finals: Mutex<Vec<MissileState>>,
    }

    impl Script {
        fn push(&self, read: Consumed) {
            self.reads.lock().unwrap().push_back(read);
        }
    }

    impl Uplink for Script {
        fn establish(&self, _: &Missile, initial: MissileState) -> bool {
            self.sent.lock().unwrap().push(initial);
            true
        }
        fn send(&self, state: MissileState) {
            self.sent.lock().unwrap().push(state);
        }
        fn terminate(&self, final_state: MissileState) -> bool {
            self.finals.lock().unwrap().push(final_state);
            true
        }
        fn consume_latest(&self, _: MissileId) -> Consumed {
            self.reads.lock().unwrap().pop_front().unwrap_or(Consumed::Empty)
        }
        fn negotiate(&self, _: &Missile) -> Result<HardwareConfig, TransportError> {
            Ok(HardwareConfig::default())
        }
    }

    /// Empty sky with an optional wall the next move runs into.
    #[derive(Default)]
    struct Sky {
        moves: Vec<Vec3>,
        wall_ahead: bool,
        detonations: Vec<f64>,
        discards: usize,
        launches: usize,
    }

    impl HostWorld for Sky {
        fn entities_within(&self, _: Vec3, _: f64) -> Vec<TrackedEntity> {
            Vec::new()
        }
        fn entity(&self, _: EntityId) -> Option<TrackedEntity> {
            None
        }
        fn line_of_sight(&self, _: Vec3, _: Vec3) -> bool {
            true
        }
        fn move_missile(&mut self, _: MissileId, from: Vec3, d: Vec3) -> Motion {
            self.moves.push(d);
            Motion {
                position: from + d,
                impact: self.wall_ahead.then_some(Impact::Terrain),
            }
        }
        fn launch_effects(&mut self, _: MissileId, _: Vec3) {
            self.launches += 1;
        }
        fn detonate(&mut self, _: MissileId, _: Vec3, power: f64) {
            self.detonations.push(power);
        }
        fn highlight(&mut self, _: EntityId, _: u32) {}
        fn discard(&mut self, _: MissileId) {
            self.discards += 1;
        }
    }

    fn missile(budget: u32) -> GuidedMissile {
        GuidedMissile::new(
            Missile {
                id: MissileId(9),
                name: "test".into(),
                connection_id: ConnectionId(0),
                budget,
            },
            Launch {
                position: Vec3::new(0.0, 64.0, 0.0),
                direction: Vec3::new(0.0, 0.0, 1.0),
                launcher: None,
            },
            GaussianNoise::seeded(5),
        )
    }

    fn armed() -> HardwareConfig {
        HardwareConfig {
            warhead: Warhead::TntM,
            seeker: Seeker::IrSeekerM,
            ..HardwareConfig::default()
        }
    }

    fn with_hardware(sequence: u64, hardware: HardwareConfig) -> Consumed {
        let mut cmd = ControlInput::turn(sequence, 0.0, 0.0);
        cmd.hardware = Some(hardware);
        Consumed::Fresh(cmd)
    }

    // ── Launch tests ────────────────────────────────────────────

    #[test]
    fn launch_opens_session_and_stands_still() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(150);
        assert_eq!(
            m.tick(&uplink, &mut sky),
            TickOutcome::Launched { guided: true }
        );
        assert_eq!(m.tick_count(), TickId(1));
        assert_eq!(m.velocity(), Vec3::ZERO);
        assert_eq!(sky.launches, 1);
        assert!(sky.moves.is_empty());
        let sent = uplink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tick, TickId(0));
        assert!(!sent[0].target_lock);
    }

    #[test]
    fn launch_inherits_launcher_velocity() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(150);
        m.launch.launcher = Some(Launcher {
            id: EntityId(1),
            velocity: Vec3::new(0.5, 0.0, 0.0),
        });
        m.tick(&uplink, &mut sky);
        assert_eq!(sky.moves, vec![Vec3::new(1.0, 0.0, 0.0)]);
        assert_eq!(m.velocity(), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(m.position(), Vec3::new(1.0, 64.0, 0.0));
    }

    // ── Hardware tests ──────────────────────────────────────────

    #[test]
    fn over_budget_hardware_is_ignored() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(1_000);
        m.tick(&uplink, &mut sky);
        uplink.push(with_hardware(1, armed()));
        assert_eq!(m.tick(&uplink, &mut sky), TickOutcome::Flying);
        assert_eq!(m.profile(), &HardwareProfile::default());
    }

    #[test]
    fn hardware_only_loads_on_first_flight_tick() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(5_000);
        m.tick(&uplink, &mut sky);
        m.tick(&uplink, &mut sky);
        uplink.push(with_hardware(1, armed()));
        m.tick(&uplink, &mut sky);
        assert!(!m.profile().detonates());

        let mut m = missile(5_000);
        m.tick(&uplink, &mut sky);
        uplink.push(with_hardware(1, armed()));
        m.tick(&uplink, &mut sky);
        assert!(m.profile().detonates());
    }

    // ── Termination tests ───────────────────────────────────────

    #[test]
    fn explode_command_detonates_armed_warhead() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(5_000);
        m.tick(&uplink, &mut sky);
        uplink.push(with_hardware(1, armed()));
        m.tick(&uplink, &mut sky);

        let mut boom = ControlInput::turn(2, 0.0, 0.0);
        boom.explode = true;
        uplink.push(Consumed::Fresh(boom));
        assert_eq!(
            m.tick(&uplink, &mut sky),
            TickOutcome::Terminated(Termination::Commanded)
        );
        assert_eq!(sky.detonations, vec![6.0]);
        assert_eq!(sky.discards, 1);
        // Counter advances on the tick the missile leaves.
        assert_eq!(m.tick_count(), TickId(3));
        let finals = uplink.finals.lock().unwrap();
        assert_eq!(finals.len(), 1);
        assert!(finals[0].destroyed);
        assert_eq!(finals[0].tick, TickId(2));
    }

    #[test]
    fn disarm_discards_without_explosion() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(5_000);
        m.tick(&uplink, &mut sky);
        uplink.push(with_hardware(1, armed()));
        m.tick(&uplink, &mut sky);
        let mut off = ControlInput::turn(2, 0.0, 0.0);
        off.disarm = true;
        uplink.push(Consumed::Fresh(off));
        assert_eq!(
            m.tick(&uplink, &mut sky),
            TickOutcome::Terminated(Termination::Disarmed)
        );
        assert!(sky.detonations.is_empty());
        assert_eq!(sky.discards, 1);
    }

    #[test]
    fn lost_link_behaves_like_explode() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(150);
        m.tick(&uplink, &mut sky);
        uplink.push(Consumed::LinkLost);
        assert_eq!(
            m.tick(&uplink, &mut sky),
            TickOutcome::Terminated(Termination::LinkLost)
        );
        assert_eq!(uplink.finals.lock().unwrap().len(), 1);
        assert_eq!(m.tick(&uplink, &mut sky), TickOutcome::Inert);
        assert_eq!(uplink.finals.lock().unwrap().len(), 1);
    }

    #[test]
    fn impact_detonates_after_telemetry() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(150);
        m.tick(&uplink, &mut sky);
        sky.wall_ahead = true;
        assert_eq!(
            m.tick(&uplink, &mut sky),
            TickOutcome::Terminated(Termination::Impact)
        );
        // Initial state plus the impact tick's telemetry.
        assert_eq!(uplink.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn time_to_live_expires_flight() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(150);
        let mut last = m.tick(&uplink, &mut sky);
        while !m.is_terminated() {
            last = m.tick(&uplink, &mut sky);
        }
        assert_eq!(last, TickOutcome::Terminated(Termination::Expired));
        assert_eq!(m.tick_count(), TickId(201));
        // Launch state plus ticks 1..=200.
        assert_eq!(uplink.sent.lock().unwrap().len(), 201);
    }

    #[test]
    fn host_triggers_are_one_shot() {
        let (uplink, mut sky) = (Script::default(), Sky::default());
        let mut m = missile(150);
        m.tick(&uplink, &mut sky);
        assert!(m.explode(&uplink, &mut sky));
        assert!(!m.disarm(&uplink, &mut sky));
        assert!(!m.destroy(&uplink));
        assert_eq!(uplink.finals.lock().unwrap().len(), 1);
        // Blank warhead: nothing to detonate.
        assert!(sky.detonations.is_empty());
    }
}
