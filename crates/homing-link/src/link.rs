//! User-facing [`GuidanceLink`] and its shutdown state machine.
//!
//! # Architecture
//!
//! ```text
//! Tick Thread                  Transport Threads            Link Worker
//!     |                               |                          |
//!     |--establish()--> open_stream ->|                          |
//!     |--send()-------> try_send ---->| write State              |
//!     |                               | Control -> buffer.store  |
//!     |--consume_latest() <- buffer   | error -> link lost       |
//!     |--terminate()--> complete ---->|                          |
//!     |   [tasks: bounded(256)]------------------------------->  | poll completion
//!     |                               | EOF -> completion.signal | release buffers
//!     |                               |                          | probe every 30s
//! ```
//!
//! The tick thread only performs short map lookups and non-blocking
//! queue pushes. Everything that waits runs on the link worker or on
//! transport threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use homing_core::{
    ConnectionId, Consumed, HardwareConfig, Missile, MissileId, MissileState, TransportError,
    Uplink,
};

use crate::buffer::CommandBuffer;
use crate::config::{ConfigError, LinkConfig};
use crate::metrics::{LinkMetrics, LinkStats};
use crate::prober::LivenessProber;
use crate::registry::{EndpointRegistry, RegistryError};
use crate::session::{SessionManager, SessionState};
use crate::transport::Transport;
use crate::worker::{LinkWorkerState, WorkerExit, WorkerTask};

/// Capacity of the link worker's task queue.
const WORKER_QUEUE: usize = 256;

// ── ShutdownReport ───────────────────────────────────────────────

/// Report from the shutdown state machine.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Total time spent in the shutdown sequence.
    pub total_ms: u64,
    /// Sessions that were still streaming and got closed without waiting.
    pub sessions_closed: usize,
    /// Teardowns the worker released without waiting for the server.
    pub teardowns_abandoned: usize,
    /// Whether the worker thread was joined successfully.
    pub worker_joined: bool,
}

// ── ShutdownState ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownState {
    Running,
    Draining,
    Quiescing,
    Dropped,
}

// ── GuidanceLink ─────────────────────────────────────────────────

/// Connection and session manager for every guidance server.
///
/// Explicitly constructed and owned: create one at simulation startup,
/// hand it to the flight driver, and shut it down (or drop it) with the
/// simulation.
pub struct GuidanceLink {
    config: LinkConfig,
    registry: Arc<EndpointRegistry>,
    sessions: Arc<SessionManager>,
    metrics: Arc<LinkMetrics>,
    task_tx: Sender<WorkerTask>,
    shutdown_flag: Arc<AtomicBool>,
    worker_stopped: Arc<AtomicBool>,
    worker: Option<JoinHandle<WorkerExit>>,
    state: ShutdownState,
}

impl GuidanceLink {
    /// Validate `config`, spawn the link worker and register every
    /// configured endpoint. Each endpoint is probed immediately.
    pub fn new(config: LinkConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;

        let metrics = Arc::new(LinkMetrics::default());
        let registry = Arc::new(EndpointRegistry::new(config.clone(), transport));
        let buffer = Arc::new(CommandBuffer::new(Arc::clone(&metrics)));
        let (task_tx, task_rx) = crossbeam_channel::bounded(WORKER_QUEUE);
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&registry),
            buffer,
            Arc::clone(&metrics),
            task_tx.clone(),
            config.teardown_timeout,
        ));

        for id in &config.connection_ids {
            registry.register_endpoint(*id)?;
            LinkMetrics::bump(&metrics.endpoints_registered);
        }

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let worker_stopped = Arc::new(AtomicBool::new(false));
        let prober = LivenessProber::new(
            Arc::clone(&registry),
            config.probe_deadline,
            Arc::clone(&metrics),
        );
        let state = LinkWorkerState::new(
            task_rx,
            Arc::clone(&sessions),
            prober,
            Arc::clone(&shutdown_flag),
            Arc::clone(&worker_stopped),
            config.probe_interval,
        );
        let worker = thread::Builder::new()
            .name("homing-link".into())
            .spawn(move || state.run())
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("link worker: {e}"),
            })?;

        // Prime every lazy channel.
        let _ = task_tx.try_send(WorkerTask::ProbeAll);

        Ok(Self {
            config,
            registry,
            sessions,
            metrics,
            task_tx,
            shutdown_flag,
            worker_stopped,
            worker: Some(worker),
            state: ShutdownState::Running,
        })
    }

    /// Register one more endpoint and probe it in the background.
    pub fn register_endpoint(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.registry.register_endpoint(id)?;
        LinkMetrics::bump(&self.metrics.endpoints_registered);
        if self.task_tx.try_send(WorkerTask::Probe(id)).is_err() {
            log::debug!("link worker busy; endpoint {id} will be probed on the next sweep");
        }
        Ok(())
    }

    /// Whether an endpoint is registered for `id`.
    pub fn has_endpoint(&self, id: ConnectionId) -> bool {
        self.registry.has_endpoint(id)
    }

    /// Open the guidance session for `missile`.
    pub fn establish(&self, missile: &Missile, initial: MissileState) -> bool {
        self.sessions.establish(missile, initial)
    }

    /// Push one telemetry snapshot.
    pub fn send(&self, state: MissileState) {
        self.sessions.send(state)
    }

    /// Close the session of the missile `final_state` describes.
    pub fn terminate(&self, final_state: MissileState) -> bool {
        self.sessions.terminate(final_state)
    }

    /// Read the latest command for `missile`.
    pub fn consume_latest(&self, missile: MissileId) -> Consumed {
        self.sessions.consume_latest(missile)
    }

    /// Whether `missile`'s id is taken by an open or closing session.
    pub fn holds_session(&self, missile: MissileId) -> bool {
        self.sessions.holds(missile)
    }

    /// Lifecycle state of `missile`'s session.
    pub fn session_state(&self, missile: MissileId) -> SessionState {
        self.sessions.state(missile)
    }

    /// Registration call: ask the missile's server for its hardware.
    ///
    /// Blocks for at most the configured registration deadline.
    pub fn register_missile(&self, missile: &Missile) -> Result<HardwareConfig, TransportError> {
        let result = match self.registry.channel_for(missile.connection_id) {
            Some(channel) => channel.register_missile(missile, self.config.register_deadline),
            None => Err(TransportError::Unavailable {
                endpoint: self.config.server_address(missile.connection_id),
                reason: "endpoint not registered".into(),
            }),
        };
        if let Err(e) = &result {
            LinkMetrics::bump(&self.metrics.registrations_failed);
            log::warn!("registration of missile {} failed: {e}", missile.id);
        }
        result
    }

    /// Snapshot of the link counters.
    pub fn stats(&self) -> LinkStats {
        self.metrics.snapshot()
    }

    /// Sessions currently streaming.
    pub fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    /// Sessions waiting for their server to finish.
    pub fn pending_teardowns(&self) -> usize {
        self.sessions.terminating_count()
    }

    /// The configuration this link was built from.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Shut the link down with the 4-state machine.
    ///
    /// 1. **Running → Draining:** complete every open stream and release
    ///    its buffers without waiting for the servers.
    /// 2. **Draining → Quiescing (≤200ms):** stop the worker; it releases
    ///    pending teardowns without waiting.
    /// 3. **Quiescing → Dropped:** join the worker and drop all channels.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.state == ShutdownState::Dropped {
            return ShutdownReport {
                total_ms: 0,
                sessions_closed: 0,
                teardowns_abandoned: 0,
                worker_joined: true,
            };
        }

        let start = Instant::now();

        // Phase 1: Running → Draining
        self.state = ShutdownState::Draining;
        let sessions_closed = self.sessions.close_all();

        // Phase 2: Draining → Quiescing
        self.state = ShutdownState::Quiescing;
        self.shutdown_flag.store(true, Ordering::Release);
        let _ = self.task_tx.try_send(WorkerTask::Wake);
        let quiesce_deadline = Instant::now() + Duration::from_millis(200);
        while !self.worker_stopped.load(Ordering::Acquire) {
            if Instant::now() > quiesce_deadline {
                log::warn!("link worker did not stop within 200ms; joining anyway");
                break;
            }
            thread::yield_now();
        }

        // Phase 3: Quiescing → Dropped
        self.state = ShutdownState::Dropped;
        let (worker_joined, teardowns_abandoned) = match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(exit) => (true, exit.abandoned),
                Err(_) => (false, 0),
            },
            None => (true, 0),
        };
        self.registry.clear();

        let total_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "guidance link shut down in {total_ms}ms ({sessions_closed} session(s) closed)"
        );
        ShutdownReport {
            total_ms,
            sessions_closed,
            teardowns_abandoned,
            worker_joined,
        }
    }
}

impl Drop for GuidanceLink {
    fn drop(&mut self) {
        if self.state != ShutdownState::Dropped {
            self.shutdown();
        }
    }
}

impl Uplink for GuidanceLink {
    fn establish(&self, missile: &Missile, initial: MissileState) -> bool {
        GuidanceLink::establish(self, missile, initial)
    }

    fn send(&self, state: MissileState) {
        GuidanceLink::send(self, state)
    }

    fn terminate(&self, final_state: MissileState) -> bool {
        GuidanceLink::terminate(self, final_state)
    }

    fn consume_latest(&self, missile: MissileId) -> Consumed {
        GuidanceLink::consume_latest(self, missile)
    }

    fn negotiate(&self, missile: &Missile) -> Result<HardwareConfig, TransportError> {
        self.register_missile(missile)
    }

    fn holds_session(&self, missile: MissileId) -> bool {
        GuidanceLink::holds_session(self, missile)
    }
}

// Compile-time assertion: GuidanceLink must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<GuidanceLink>();
};
