//! The host-facing entry points: launch, per-tick stepping and
//! lifecycle triggers for every missile in flight.
//!
//! One [`FlightDriver`] is owned by the simulation and called from its
//! tick thread. It never blocks on the network: the only waiting call
//! is the optional hardware negotiation at launch, bounded by the
//! link's registration deadline.

use std::sync::Arc;

use homing_core::{Missile, MissileId, Uplink, Vec3};
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::host::HostWorld;
use crate::identify::LaunchTag;
use crate::missile::{GuidedMissile, Launch, Launcher, Termination, TickOutcome};
use crate::noise::GaussianNoise;

/// Driver settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverConfig {
    /// Seed for missile ids and per-missile noise.
    pub seed: u64,
    /// Ask the guidance server for hardware through the registration
    /// call before the launch tick.
    pub negotiate_hardware: bool,
}

/// Everything the host knows about a new guided launch.
#[derive(Clone, Debug, PartialEq)]
pub struct LaunchRequest {
    /// Parsed name tag.
    pub tag: LaunchTag,
    /// Hardware budget derived from the payload.
    pub budget: u32,
    /// Spawn position.
    pub position: Vec3,
    /// Firing direction.
    pub direction: Vec3,
    /// Who fired it.
    pub launcher: Option<Launcher>,
}

/// Missiles that left the world during one [`FlightDriver::tick_all`].
pub type Departures = SmallVec<[(MissileId, Termination); 4]>;

/// Summary of one [`FlightDriver::tick_all`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickSummary {
    /// Missiles still in flight afterwards.
    pub in_flight: usize,
    /// Missiles that left the world, in tick order.
    pub departed: Departures,
}

/// Owns every guided missile and routes host calls to them.
pub struct FlightDriver<U: Uplink + ?Sized> {
    uplink: Arc<U>,
    config: DriverConfig,
    rng: GaussianNoise,
    missiles: IndexMap<MissileId, GuidedMissile>,
}

impl<U: Uplink + ?Sized> FlightDriver<U> {
    /// A driver talking to guidance servers through `uplink`.
    pub fn new(uplink: Arc<U>, config: DriverConfig) -> Self {
        Self {
            rng: GaussianNoise::seeded(config.seed),
            uplink,
            config,
            missiles: IndexMap::new(),
        }
    }

    /// The uplink in use.
    pub fn uplink(&self) -> &Arc<U> {
        &self.uplink
    }

    /// Settings.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Create a missile and run its launch tick.
    ///
    /// Returns the new missile's id. If the launch tick already ended
    /// the flight (for example on impact), the missile is not kept.
    pub fn launch<W: HostWorld + ?Sized>(
        &mut self,
        request: LaunchRequest,
        world: &mut W,
    ) -> MissileId {
        let id = self.fresh_id();
        let missile = Missile {
            id,
            name: request.tag.name,
            connection_id: request.tag.connection_id,
            budget: request.budget,
        };
        let launch = Launch {
            position: request.position,
            direction: request.direction,
            launcher: request.launcher,
        };
        let noise = GaussianNoise::seeded(self.rng.next_u64());
        let mut guided = GuidedMissile::new(missile, launch, noise);

        if self.config.negotiate_hardware {
            match self.uplink.negotiate(guided.missile()) {
                Ok(hardware) => {
                    // Rejections are logged by the profile and leave the default.
                    let _ = guided.apply_hardware(&hardware);
                }
                Err(e) => log::warn!("hardware negotiation for missile {id} failed: {e}"),
            }
        }

        let outcome = guided.tick(&*self.uplink, world);
        log::debug!("missile {id} launch outcome {outcome:?}");
        if !guided.is_terminated() {
            self.missiles.insert(id, guided);
        }
        id
    }

    /// Advance one missile by one tick. `None` if it is not in flight.
    pub fn step<W: HostWorld + ?Sized>(
        &mut self,
        id: MissileId,
        world: &mut W,
    ) -> Option<TickOutcome> {
        let missile = self.missiles.get_mut(&id)?;
        let outcome = missile.tick(&*self.uplink, world);
        if missile.is_terminated() {
            self.missiles.shift_remove(&id);
        }
        Some(outcome)
    }

    /// Advance every missile by one tick, in launch order.
    pub fn tick_all<W: HostWorld + ?Sized>(&mut self, world: &mut W) -> TickSummary {
        let mut departed = Departures::new();
        for (id, missile) in self.missiles.iter_mut() {
            if let TickOutcome::Terminated(reason) = missile.tick(&*self.uplink, world) {
                departed.push((*id, reason));
            }
        }
        self.missiles.retain(|_, m| !m.is_terminated());
        TickSummary {
            in_flight: self.missiles.len(),
            departed,
        }
    }

    /// Host trigger: detonate `id` now.
    pub fn explode<W: HostWorld + ?Sized>(&mut self, id: MissileId, world: &mut W) -> bool {
        match self.missiles.shift_remove(&id) {
            Some(mut missile) => missile.explode(&*self.uplink, world),
            None => false,
        }
    }

    /// Host trigger: remove `id` without detonating.
    pub fn disarm<W: HostWorld + ?Sized>(&mut self, id: MissileId, world: &mut W) -> bool {
        match self.missiles.shift_remove(&id) {
            Some(mut missile) => missile.disarm(&*self.uplink, world),
            None => false,
        }
    }

    /// Host trigger: `id` was removed by the host; close its session.
    pub fn destroy(&mut self, id: MissileId) -> bool {
        match self.missiles.shift_remove(&id) {
            Some(mut missile) => missile.destroy(&*self.uplink),
            None => false,
        }
    }

    /// Close every session, as at simulation shutdown.
    ///
    /// Returns how many missiles were in flight.
    pub fn destroy_all(&mut self) -> usize {
        let n = self.missiles.len();
        for (_, mut missile) in self.missiles.drain(..) {
            missile.destroy(&*self.uplink);
        }
        n
    }

    /// A missile in flight.
    pub fn missile(&self, id: MissileId) -> Option<&GuidedMissile> {
        self.missiles.get(&id)
    }

    /// Ids of every missile in flight, in launch order.
    pub fn ids(&self) -> impl Iterator<Item = MissileId> + '_ {
        self.missiles.keys().copied()
    }

    /// Missiles in flight.
    pub fn len(&self) -> usize {
        self.missiles.len()
    }

    /// Whether no missile is in flight.
    pub fn is_empty(&self) -> bool {
        self.missiles.is_empty()
    }

    fn fresh_id(&mut self) -> MissileId {
        loop {
            let id = MissileId::from_random(self.rng.next_u32());
            if !self.missiles.contains_key(&id) && !self.uplink.holds_session(id) {
                return id;
            }
        }
    }
}

// Compile-time assertion: a driver over a thread-safe uplink can move
// to the tick thread.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<FlightDriver<dyn Uplink>>();
};
