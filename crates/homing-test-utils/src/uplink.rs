//! Network-free [`Uplink`] for flight tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use homing_core::{
    Consumed, ControlInput, HardwareConfig, Missile, MissileId, MissileState, TransportError,
    Uplink,
};
use indexmap::IndexMap;

/// Records everything the flight loop sends and replays scripted reads.
///
/// With nothing scripted for a missile, `consume_latest` returns
/// [`Consumed::Empty`].
pub struct RecordingUplink {
    accept: AtomicBool,
    established: Mutex<Vec<(Missile, MissileState)>>,
    sent: Mutex<Vec<MissileState>>,
    terminated: Mutex<Vec<MissileState>>,
    reads: Mutex<IndexMap<MissileId, VecDeque<Consumed>>>,
    negotiation: Mutex<Result<HardwareConfig, TransportError>>,
}

impl Default for RecordingUplink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingUplink {
    pub fn new() -> Self {
        Self {
            accept: AtomicBool::new(true),
            established: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            reads: Mutex::new(IndexMap::new()),
            negotiation: Mutex::new(Ok(HardwareConfig::default())),
        }
    }

    /// Whether `establish` succeeds (no endpoint when false).
    pub fn accept_sessions(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    /// Queue one read for `missile`.
    pub fn script(&self, missile: MissileId, read: Consumed) {
        self.reads
            .lock()
            .unwrap()
            .entry(missile)
            .or_default()
            .push_back(read);
    }

    /// Queue a fresh command for `missile`.
    pub fn command(&self, missile: MissileId, input: ControlInput) {
        self.script(missile, Consumed::Fresh(input));
    }

    /// What `negotiate` answers.
    pub fn answer_negotiation(&self, answer: Result<HardwareConfig, TransportError>) {
        *self.negotiation.lock().unwrap() = answer;
    }

    pub fn established(&self) -> Vec<(Missile, MissileState)> {
        self.established.lock().unwrap().clone()
    }

    /// Telemetry sent for `missile`, excluding the initial state.
    pub fn sent_for(&self, missile: MissileId) -> Vec<MissileState> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.missile == missile)
            .cloned()
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn terminated(&self) -> Vec<MissileState> {
        self.terminated.lock().unwrap().clone()
    }
}

impl Uplink for RecordingUplink {
    fn establish(&self, missile: &Missile, initial: MissileState) -> bool {
        if !self.accept.load(Ordering::SeqCst) {
            return false;
        }
        self.established
            .lock()
            .unwrap()
            .push((missile.clone(), initial));
        true
    }

    fn send(&self, state: MissileState) {
        self.sent.lock().unwrap().push(state);
    }

    fn terminate(&self, final_state: MissileState) -> bool {
        let mut terminated = self.terminated.lock().unwrap();
        if terminated.iter().any(|s| s.missile == final_state.missile) {
            return false;
        }
        terminated.push(final_state);
        true
    }

    fn consume_latest(&self, missile: MissileId) -> Consumed {
        self.reads
            .lock()
            .unwrap()
            .get_mut(&missile)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Consumed::Empty)
    }

    fn negotiate(&self, _missile: &Missile) -> Result<HardwareConfig, TransportError> {
        self.negotiation.lock().unwrap().clone()
    }
}
