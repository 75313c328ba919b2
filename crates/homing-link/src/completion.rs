//! One-shot completion signal for a guidance stream.
//!
//! Fired exactly once, by the transport's terminal event (normal
//! completion or error). Polled only by the background link worker
//! during teardown; the tick thread never looks at it.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use homing_core::TransportError;

/// How a stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The server finished the stream.
    Finished,
    /// The stream failed.
    Failed(TransportError),
}

/// A signal that fires at most once.
#[derive(Debug)]
pub struct CompletionSignal {
    fired: AtomicBool,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    /// An unfired signal.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            fired: AtomicBool::new(false),
            tx,
            rx,
        }
    }

    /// Fire the signal. Returns `false` if it had already fired; the
    /// later outcome is discarded.
    pub fn signal(&self, outcome: Completion) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Capacity 1 and a single successful swap: this cannot be full.
        let _ = self.tx.try_send(outcome);
        true
    }

    /// Take the outcome if the signal has fired. Returns `Some` once.
    pub fn try_take(&self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }
}
