//! Per-missile guidance sessions.
//!
//! ```text
//! Unconnected ──establish──> Establishing ──first send──> Streaming
//!                                                            │
//!                                          terminate(final)  │
//!                                                            v
//!                     Closed <──worker: completion/timeout── Terminating
//! ```
//!
//! The session map lock is held only for lookups, inserts and removals.
//! Stream opening and telemetry sends happen after the lock is released,
//! so a slow transport can never stall the tick thread on this lock.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use homing_core::{Consumed, Missile, MissileId, MissileState};
use indexmap::{IndexMap, IndexSet};

use crate::buffer::CommandBuffer;
use crate::completion::{Completion, CompletionSignal};
use crate::metrics::LinkMetrics;
use crate::registry::EndpointRegistry;
use crate::transport::{OutboundStream, StreamEvent, StreamObserver};
use crate::worker::WorkerTask;

/// How many closed missile ids are remembered for [`SessionManager::state`].
const CLOSED_HISTORY: usize = 256;

// ── SessionState ─────────────────────────────────────────────────

/// Lifecycle of one missile's guidance session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session exists.
    Unconnected,
    /// The stream is open; the initial state has not been sent yet.
    Establishing,
    /// Telemetry and commands are flowing.
    Streaming,
    /// The final state was sent; waiting for the server to finish.
    Terminating,
    /// Teardown finished and every buffer was released.
    Closed,
}

impl SessionState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Unconnected => 0,
            Self::Establishing => 1,
            Self::Streaming => 2,
            Self::Terminating => 3,
            Self::Closed => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Establishing,
            2 => Self::Streaming,
            3 => Self::Terminating,
            4 => Self::Closed,
            _ => Self::Unconnected,
        }
    }
}

/// Why a teardown stopped waiting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The completion signal fired in time.
    Completed(Completion),
    /// The server did not finish the stream before the deadline.
    TimedOut,
    /// The worker was gone or shutting down; buffers were released
    /// without waiting.
    Abandoned,
}

// ── Session ──────────────────────────────────────────────────────

struct Session {
    missile: Missile,
    outbound: Box<dyn OutboundStream>,
    observer: Arc<SessionObserver>,
    completion: Arc<CompletionSignal>,
    state: AtomicU8,
}

impl Session {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }
}

/// Routes inbound events of one stream into the command buffer and the
/// session's completion signal.
///
/// Retired once the session's teardown ends; a retired observer drops
/// everything, so a later session reusing the missile id never sees
/// events from the old stream.
struct SessionObserver {
    missile: MissileId,
    buffer: Arc<CommandBuffer>,
    completion: Arc<CompletionSignal>,
    metrics: Arc<LinkMetrics>,
    retired: AtomicBool,
}

impl SessionObserver {
    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

impl StreamObserver for SessionObserver {
    fn on_event(&self, event: StreamEvent) {
        if self.retired.load(Ordering::Acquire) {
            if matches!(event, StreamEvent::Command(_)) {
                LinkMetrics::bump(&self.metrics.commands_dropped);
            }
            log::trace!("dropping event from closed stream of missile {}", self.missile);
            return;
        }
        match event {
            StreamEvent::Command(input) => {
                self.buffer.store(self.missile, input);
            }
            StreamEvent::Completed => {
                if self.completion.signal(Completion::Finished) {
                    LinkMetrics::bump(&self.metrics.streams_finished);
                    log::info!("guidance stream for missile {} completed", self.missile);
                }
            }
            StreamEvent::Failed(e) => {
                if self.completion.signal(Completion::Failed(e.clone())) {
                    LinkMetrics::bump(&self.metrics.stream_failures);
                    log::warn!("guidance stream for missile {} failed: {e}", self.missile);
                    self.buffer.mark_link_lost(self.missile);
                }
            }
        }
    }
}

// ── SessionManager ───────────────────────────────────────────────

/// Opens, feeds and tears down guidance sessions.
pub struct SessionManager {
    registry: Arc<EndpointRegistry>,
    buffer: Arc<CommandBuffer>,
    metrics: Arc<LinkMetrics>,
    tasks: Sender<WorkerTask>,
    teardown_timeout: Duration,
    active: Mutex<IndexMap<MissileId, Arc<Session>>>,
    terminating: Mutex<IndexMap<MissileId, Arc<SessionObserver>>>,
    closed: Mutex<IndexSet<MissileId>>,
}

impl SessionManager {
    pub(crate) fn new(
        registry: Arc<EndpointRegistry>,
        buffer: Arc<CommandBuffer>,
        metrics: Arc<LinkMetrics>,
        tasks: Sender<WorkerTask>,
        teardown_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            buffer,
            metrics,
            tasks,
            teardown_timeout,
            active: Mutex::new(IndexMap::new()),
            terminating: Mutex::new(IndexMap::new()),
            closed: Mutex::new(IndexSet::new()),
        }
    }

    fn lookup(&self, missile: MissileId) -> Option<Arc<Session>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&missile)
            .cloned()
    }

    /// Open a session for `missile` and send `initial` on it.
    ///
    /// Logged no-op (returns `false`) when no endpoint is registered for
    /// the missile's connection id, or a session for the id is open or
    /// still tearing down. If the
    /// transport cannot open the stream, the command slot is left in
    /// the link-lost state so the missile is destroyed on its next tick.
    pub fn establish(&self, missile: &Missile, initial: MissileState) -> bool {
        let id = missile.id;
        let Some(channel) = self.registry.channel_for(missile.connection_id) else {
            LinkMetrics::bump(&self.metrics.sessions_rejected);
            log::warn!(
                "no guidance endpoint {} for missile {id}; flying without guidance",
                missile.connection_id
            );
            return false;
        };
        if self.lookup(id).is_some() {
            LinkMetrics::bump(&self.metrics.sessions_rejected);
            log::warn!("missile {id} already has a guidance session");
            return false;
        }
        // The old stream still owns the command slot until its teardown ends.
        if self.is_terminating(id) {
            LinkMetrics::bump(&self.metrics.sessions_rejected);
            log::warn!("missile {id} is still closing its previous guidance session");
            return false;
        }

        self.buffer.open(id);
        let completion = Arc::new(CompletionSignal::new());
        let observer = Arc::new(SessionObserver {
            missile: id,
            buffer: Arc::clone(&self.buffer),
            completion: Arc::clone(&completion),
            metrics: Arc::clone(&self.metrics),
            retired: AtomicBool::new(false),
        });

        let outbound = match channel.open_stream(missile, observer.clone()) {
            Ok(outbound) => outbound,
            Err(e) => {
                LinkMetrics::bump(&self.metrics.sessions_rejected);
                log::warn!(
                    "cannot open guidance stream for missile {id} on {}: {e}",
                    channel.endpoint()
                );
                observer.on_event(StreamEvent::Failed(e));
                return false;
            }
        };

        let session = Arc::new(Session {
            missile: missile.clone(),
            outbound,
            observer,
            completion,
            state: AtomicU8::new(SessionState::Establishing.to_u8()),
        });
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&session));
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&id);
        LinkMetrics::bump(&self.metrics.sessions_opened);
        log::info!(
            "opened guidance session for missile {id} ({}) on {}",
            missile.name,
            channel.endpoint()
        );

        self.push(&session, initial);
        session.set_state(SessionState::Streaming);
        true
    }

    /// Push one telemetry snapshot. No-op without a session.
    ///
    /// A synchronous send failure is reported to the stream's inbound
    /// handler as a stream failure; the caller is not expected to retry.
    pub fn send(&self, state: MissileState) {
        match self.lookup(state.missile) {
            Some(session) => self.push(&session, state),
            None => log::trace!("no guidance session for missile {}", state.missile),
        }
    }

    fn push(&self, session: &Session, state: MissileState) {
        if let Err(e) = session.outbound.send(state) {
            LinkMetrics::bump(&self.metrics.send_failures);
            log::warn!(
                "telemetry send for missile {} failed: {e}",
                session.missile.id
            );
            session.observer.on_event(StreamEvent::Failed(e));
        }
    }

    /// Send the final snapshot, close the outbound stream and hand the
    /// wait for the server's completion to the background worker.
    ///
    /// Idempotent: a second call for the same missile is a logged no-op
    /// and sends nothing.
    pub fn terminate(&self, mut final_state: MissileState) -> bool {
        let id = final_state.missile;
        if !final_state.destroyed {
            log::warn!("final state for missile {id} was not marked destroyed; marking it");
            final_state.destroyed = true;
        }

        let removed = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&id);
        let Some(session) = removed else {
            log::debug!("terminate for missile {id} without a session");
            // A stream that failed to open still left a slot behind.
            self.buffer.release(id);
            return false;
        };

        session.set_state(SessionState::Terminating);
        self.terminating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&session.observer));

        self.push(&session, final_state);
        session.outbound.complete();
        log::info!("closing guidance session for missile {id}");

        let task = WorkerTask::AwaitCompletion {
            missile: id,
            completion: Arc::clone(&session.completion),
            deadline: Instant::now() + self.teardown_timeout,
        };
        match self.tasks.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("link worker queue full; releasing missile {id} without waiting");
                self.finish_teardown(id, TeardownOutcome::Abandoned);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("link worker stopped; releasing missile {id} without waiting");
                self.finish_teardown(id, TeardownOutcome::Abandoned);
            }
        }
        true
    }

    /// Release everything held for `missile` after its teardown wait.
    pub(crate) fn finish_teardown(&self, missile: MissileId, outcome: TeardownOutcome) {
        let observer = self
            .terminating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&missile);
        if let Some(observer) = observer {
            observer.retire();
        }
        self.buffer.release(missile);
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        closed.insert(missile);
        if closed.len() > CLOSED_HISTORY {
            closed.shift_remove_index(0);
        }
        drop(closed);

        match outcome {
            TeardownOutcome::Completed(Completion::Finished) => {
                LinkMetrics::bump(&self.metrics.teardowns_completed);
                log::debug!("teardown of missile {missile} complete");
            }
            TeardownOutcome::Completed(Completion::Failed(e)) => {
                LinkMetrics::bump(&self.metrics.teardowns_completed);
                log::debug!("teardown of missile {missile} complete after stream error: {e}");
            }
            TeardownOutcome::TimedOut => {
                LinkMetrics::bump(&self.metrics.teardowns_timed_out);
                log::warn!(
                    "guidance server did not finish stream for missile {missile} within {}s",
                    self.teardown_timeout.as_secs()
                );
            }
            TeardownOutcome::Abandoned => {}
        }
    }

    /// Close every active session without waiting for the servers.
    ///
    /// Used at link shutdown. Returns how many sessions were closed.
    pub(crate) fn close_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .map(|(_, s)| s)
            .collect();
        for session in &sessions {
            session.set_state(SessionState::Terminating);
            session.observer.retire();
            session.outbound.complete();
            self.finish_teardown(session.missile.id, TeardownOutcome::Abandoned);
        }
        self.buffer.clear();
        sessions.len()
    }

    /// Read the latest command for `missile`.
    pub fn consume_latest(&self, missile: MissileId) -> Consumed {
        self.buffer.consume_latest(missile)
    }

    /// Current lifecycle state of `missile`'s session.
    ///
    /// Only the most recent closed sessions are remembered; older ones
    /// report [`SessionState::Unconnected`].
    pub fn state(&self, missile: MissileId) -> SessionState {
        if let Some(session) = self.lookup(missile) {
            return session.state();
        }
        if self.is_terminating(missile) {
            return SessionState::Terminating;
        }
        if self
            .closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&missile)
        {
            return SessionState::Closed;
        }
        SessionState::Unconnected
    }

    fn is_terminating(&self, missile: MissileId) -> bool {
        self.terminating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&missile)
    }

    /// Whether `missile` has a session that is open or still tearing down.
    pub fn holds(&self, missile: MissileId) -> bool {
        self.lookup(missile).is_some() || self.is_terminating(missile)
    }

    /// Number of sessions in `Establishing` or `Streaming`.
    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of sessions waiting for their teardown to finish.
    pub fn terminating_count(&self) -> usize {
        self.terminating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
