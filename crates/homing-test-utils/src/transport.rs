//! In-memory transport.
//!
//! Channels are created on `connect` and kept so a test can fetch them
//! by endpoint. Every opened stream is kept too: a test pushes commands
//! or terminal events into it and inspects the telemetry it received.
//! Events are delivered synchronously on the calling thread.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use homing_core::{
    ControlInput, HardwareConfig, Missile, MissileId, MissileState, SequenceId, TransportError,
};
use homing_link::transport::{Channel, OutboundStream, StreamEvent, StreamObserver, Transport};
use indexmap::IndexMap;

// ── MockTransport ────────────────────────────────────────────────

/// Transport handing out [`MockChannel`]s.
#[derive(Clone, Default)]
pub struct MockTransport {
    channels: Arc<Mutex<IndexMap<String, Arc<MockChannel>>>>,
    refuse: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// The channel created for `endpoint`, if any.
    pub fn channel(&self, endpoint: &str) -> Option<Arc<MockChannel>> {
        self.channels.lock().unwrap().get(endpoint).cloned()
    }

    /// Endpoints connected so far, in order.
    pub fn endpoints(&self) -> Vec<String> {
        self.channels.lock().unwrap().keys().cloned().collect()
    }
}

impl Transport for MockTransport {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Channel>, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable {
                endpoint: endpoint.to_string(),
                reason: "mock transport refusing connections".into(),
            });
        }
        let channel: Arc<MockChannel> = Arc::clone(
            self.channels
                .lock()
                .unwrap()
                .entry(endpoint.to_string())
                .or_insert_with(|| Arc::new(MockChannel::new(endpoint))),
        );
        Ok(channel)
    }
}

// ── MockChannel ──────────────────────────────────────────────────

/// One in-memory guidance server.
pub struct MockChannel {
    endpoint: String,
    healthy: AtomicBool,
    health_checks: AtomicUsize,
    refuse_streams: AtomicBool,
    hardware: Mutex<Result<HardwareConfig, TransportError>>,
    registrations: Mutex<Vec<Missile>>,
    streams: Mutex<IndexMap<MissileId, Arc<MockStream>>>,
}

impl MockChannel {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            healthy: AtomicBool::new(true),
            health_checks: AtomicUsize::new(0),
            refuse_streams: AtomicBool::new(false),
            hardware: Mutex::new(Ok(HardwareConfig::default())),
            registrations: Mutex::new(Vec::new()),
            streams: Mutex::new(IndexMap::new()),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn refuse_streams(&self, refuse: bool) {
        self.refuse_streams.store(refuse, Ordering::SeqCst);
    }

    /// What the next registration call answers.
    pub fn answer_registration(&self, answer: Result<HardwareConfig, TransportError>) {
        *self.hardware.lock().unwrap() = answer;
    }

    pub fn registrations(&self) -> Vec<Missile> {
        self.registrations.lock().unwrap().clone()
    }

    /// The stream opened for `missile`, if any.
    pub fn stream(&self, missile: MissileId) -> Option<Arc<MockStream>> {
        self.streams.lock().unwrap().get(&missile).cloned()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }
}

impl Channel for MockChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn health_check(&self, deadline: Duration) -> Result<(), TransportError> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::DeadlineExceeded { deadline })
        }
    }

    fn register_missile(
        &self,
        missile: &Missile,
        _deadline: Duration,
    ) -> Result<HardwareConfig, TransportError> {
        self.registrations.lock().unwrap().push(missile.clone());
        self.hardware.lock().unwrap().clone()
    }

    fn open_stream(
        &self,
        missile: &Missile,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<Box<dyn OutboundStream>, TransportError> {
        if self.refuse_streams.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable {
                endpoint: self.endpoint.clone(),
                reason: "mock channel refusing streams".into(),
            });
        }
        let stream = Arc::new(MockStream {
            missile: missile.clone(),
            observer,
            sent: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            next_sequence: AtomicU64::new(1),
        });
        self.streams
            .lock()
            .unwrap()
            .insert(missile.id, Arc::clone(&stream));
        Ok(Box::new(MockOutbound(stream)))
    }
}

// ── MockStream ───────────────────────────────────────────────────

/// Server side of one mock stream.
pub struct MockStream {
    missile: Missile,
    observer: Arc<dyn StreamObserver>,
    sent: Mutex<Vec<MissileState>>,
    completed: AtomicBool,
    fail_sends: AtomicBool,
    next_sequence: AtomicU64,
}

impl MockStream {
    pub fn missile(&self) -> &Missile {
        &self.missile
    }

    /// Telemetry received so far.
    pub fn sent(&self) -> Vec<MissileState> {
        self.sent.lock().unwrap().clone()
    }

    /// Whether the client completed its half.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Make client sends fail with backpressure.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Deliver `input` as-is.
    pub fn push(&self, input: ControlInput) {
        self.observer.on_event(StreamEvent::Command(input));
    }

    /// Deliver a turn with the next sequence id. Returns the id used.
    pub fn command(&self, pitch_turn: f64, yaw_turn: f64) -> SequenceId {
        let seq = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.push(ControlInput::turn(seq, pitch_turn, yaw_turn));
        SequenceId(seq)
    }

    /// Deliver an explode command with the next sequence id.
    pub fn explode(&self) {
        let seq = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let mut input = ControlInput::turn(seq, 0.0, 0.0);
        input.explode = true;
        self.push(input);
    }

    /// Finish the server half normally.
    pub fn finish(&self) {
        self.observer.on_event(StreamEvent::Completed);
    }

    /// Fail the stream.
    pub fn fail(&self, error: TransportError) {
        self.observer.on_event(StreamEvent::Failed(error));
    }
}

struct MockOutbound(Arc<MockStream>);

impl OutboundStream for MockOutbound {
    fn send(&self, state: MissileState) -> Result<(), TransportError> {
        if self.0.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Backpressure);
        }
        self.0.sent.lock().unwrap().push(state);
        Ok(())
    }

    fn complete(&self) {
        self.0.completed.store(true, Ordering::SeqCst);
    }
}
