//! Latest-command slots, one per missile.
//!
//! Transport threads [`store`](CommandBuffer::store) commands as they
//! arrive; the tick thread [`consume_latest`](CommandBuffer::consume_latest)s
//! once per tick. Only the most recent command is kept. The tick thread
//! never waits for network input: if nothing new arrived it gets the
//! previous command back, flagged [`Consumed::Stale`].
//!
//! Slot locks are held only for a pointer-sized swap or clone, never
//! across I/O.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use homing_core::{Consumed, ControlInput, MissileId};
use indexmap::IndexMap;

use crate::metrics::LinkMetrics;

/// Sentinel for "no command consumed yet".
pub const NOTHING_CONSUMED: u64 = u64::MAX;

struct Slot {
    latest: Mutex<Option<ControlInput>>,
    last_consumed: AtomicU64,
    link_lost: AtomicBool,
}

impl Slot {
    fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            last_consumed: AtomicU64::new(NOTHING_CONSUMED),
            link_lost: AtomicBool::new(false),
        }
    }
}

/// Per-missile latest-command store with staleness detection.
pub struct CommandBuffer {
    slots: RwLock<IndexMap<MissileId, Arc<Slot>>>,
    metrics: Arc<LinkMetrics>,
}

impl CommandBuffer {
    /// An empty buffer reporting into `metrics`.
    pub fn new(metrics: Arc<LinkMetrics>) -> Self {
        Self {
            slots: RwLock::new(IndexMap::new()),
            metrics,
        }
    }

    fn slot(&self, missile: MissileId) -> Option<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&missile)
            .cloned()
    }

    /// Create an empty slot for `missile`. Replaces any existing slot.
    pub fn open(&self, missile: MissileId) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(missile, Arc::new(Slot::new()));
    }

    /// Whether `missile` has a slot.
    pub fn is_open(&self, missile: MissileId) -> bool {
        self.slot(missile).is_some()
    }

    /// Number of open slots.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no slot is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the latest command for `missile`.
    ///
    /// Returns `false` (and drops the command) if the slot was already
    /// released; late arrivals after teardown are expected.
    pub fn store(&self, missile: MissileId, command: ControlInput) -> bool {
        let Some(slot) = self.slot(missile) else {
            LinkMetrics::bump(&self.metrics.commands_dropped);
            log::trace!(
                "dropping command {} for released missile {missile}",
                command.sequence
            );
            return false;
        };
        *slot.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(command);
        LinkMetrics::bump(&self.metrics.commands_received);
        true
    }

    /// Flag the inbound stream of `missile` as failed.
    pub fn mark_link_lost(&self, missile: MissileId) {
        if let Some(slot) = self.slot(missile) {
            slot.link_lost.store(true, Ordering::Release);
        }
    }

    /// Return the most recent command for `missile`.
    ///
    /// Records the returned sequence id as last consumed. A sequence id
    /// at or below the previously consumed one means the server sent
    /// nothing new (or reordered); that is logged and counted, and the
    /// command is still returned.
    pub fn consume_latest(&self, missile: MissileId) -> Consumed {
        let Some(slot) = self.slot(missile) else {
            return Consumed::Empty;
        };
        if slot.link_lost.load(Ordering::Acquire) {
            return Consumed::LinkLost;
        }
        let Some(command) = slot
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return Consumed::Empty;
        };

        let seq = command.sequence.0;
        let previous = slot.last_consumed.swap(seq, Ordering::AcqRel);
        if previous != NOTHING_CONSUMED && seq <= previous {
            LinkMetrics::bump(&self.metrics.stale_reads);
            log::warn!(
                "missile {missile}: guidance lagging, reusing command {seq} (last consumed {previous})"
            );
            Consumed::Stale(command)
        } else {
            Consumed::Fresh(command)
        }
    }

    /// Drop the slot for `missile`. Returns whether one existed.
    pub fn release(&self, missile: MissileId) -> bool {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&missile)
            .is_some()
    }

    /// Drop every slot. Returns how many were open.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let n = slots.len();
        slots.clear();
        n
    }
}
