//! The single background link worker.
//!
//! Runs bounded-time teardown waits and liveness probes, never on the
//! tick thread. Teardowns are polled rather than blocked on, so one slow
//! server cannot delay the release of other missiles' buffers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use homing_core::{ConnectionId, MissileId};

use crate::completion::CompletionSignal;
use crate::prober::LivenessProber;
use crate::session::{SessionManager, TeardownOutcome};

/// How often pending teardowns are checked while any exist.
const TEARDOWN_POLL: Duration = Duration::from_millis(10);

/// Longest idle wait, so a raised shutdown flag is seen promptly even
/// if the wake-up task could not be queued.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Work handed to the link worker.
pub(crate) enum WorkerTask {
    /// Wait up to `deadline` for `completion`, then release `missile`.
    AwaitCompletion {
        missile: MissileId,
        completion: Arc<CompletionSignal>,
        deadline: Instant,
    },
    /// Probe one endpoint now.
    Probe(ConnectionId),
    /// Probe every endpoint now.
    ProbeAll,
    /// Wake up and observe the shutdown flag.
    Wake,
}

struct PendingTeardown {
    missile: MissileId,
    completion: Arc<CompletionSignal>,
    deadline: Instant,
}

/// What the worker left behind when it stopped.
#[derive(Debug, Default)]
pub(crate) struct WorkerExit {
    /// Teardowns released without waiting because of shutdown.
    pub abandoned: usize,
}

/// State owned by the worker thread.
pub(crate) struct LinkWorkerState {
    task_rx: Receiver<WorkerTask>,
    sessions: Arc<SessionManager>,
    prober: LivenessProber,
    shutdown_flag: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    probe_interval: Duration,
    pending: Vec<PendingTeardown>,
}

impl LinkWorkerState {
    pub fn new(
        task_rx: Receiver<WorkerTask>,
        sessions: Arc<SessionManager>,
        prober: LivenessProber,
        shutdown_flag: Arc<AtomicBool>,
        stopped: Arc<AtomicBool>,
        probe_interval: Duration,
    ) -> Self {
        Self {
            task_rx,
            sessions,
            prober,
            shutdown_flag,
            stopped,
            probe_interval,
            pending: Vec::new(),
        }
    }

    /// Main loop. Runs until `shutdown_flag` is set or every task sender
    /// is gone.
    pub fn run(mut self) -> WorkerExit {
        let mut next_probe = Instant::now() + self.probe_interval;
        loop {
            if self.shutdown_flag.load(Ordering::Acquire) {
                break;
            }

            let now = Instant::now();
            let wait = if self.pending.is_empty() {
                next_probe.saturating_duration_since(now).min(IDLE_POLL)
            } else {
                TEARDOWN_POLL
            };

            match self.task_rx.recv_timeout(wait) {
                Ok(task) => self.handle(task),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.poll_teardowns(Instant::now());

            if Instant::now() >= next_probe {
                self.prober.probe_all();
                next_probe = Instant::now() + self.probe_interval;
            }
        }

        let abandoned = self.abandon_pending();
        self.stopped.store(true, Ordering::Release);
        WorkerExit { abandoned }
    }

    fn handle(&mut self, task: WorkerTask) {
        match task {
            WorkerTask::AwaitCompletion {
                missile,
                completion,
                deadline,
            } => self.pending.push(PendingTeardown {
                missile,
                completion,
                deadline,
            }),
            WorkerTask::Probe(id) => {
                self.prober.probe(id);
            }
            WorkerTask::ProbeAll => {
                self.prober.probe_all();
            }
            WorkerTask::Wake => {}
        }
    }

    /// Release every teardown whose signal fired or whose deadline passed.
    fn poll_teardowns(&mut self, now: Instant) {
        let sessions = &self.sessions;
        self.pending.retain(|p| {
            if let Some(outcome) = p.completion.try_take() {
                sessions.finish_teardown(p.missile, TeardownOutcome::Completed(outcome));
                false
            } else if now >= p.deadline {
                sessions.finish_teardown(p.missile, TeardownOutcome::TimedOut);
                false
            } else {
                true
            }
        });
    }

    fn abandon_pending(&mut self) -> usize {
        // Drain queued tasks too: their senders will never be served.
        while let Ok(task) = self.task_rx.try_recv() {
            if let WorkerTask::AwaitCompletion {
                missile,
                completion,
                deadline,
            } = task
            {
                self.pending.push(PendingTeardown {
                    missile,
                    completion,
                    deadline,
                });
            }
        }
        let n = self.pending.len();
        for p in self.pending.drain(..) {
            self.sessions
                .finish_teardown(p.missile, TeardownOutcome::Abandoned);
        }
        if n > 0 {
            log::warn!("link shutdown abandoned {n} pending teardown(s)");
        }
        n
    }
}
