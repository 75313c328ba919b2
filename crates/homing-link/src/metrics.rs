//! Link-wide counters.
//!
//! [`LinkMetrics`] is shared by every link component and updated with
//! relaxed atomics from both the tick thread and transport threads.
//! [`LinkStats`] is a plain snapshot for callers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated concurrently by the link.
#[derive(Debug, Default)]
pub struct LinkMetrics {
    pub(crate) endpoints_registered: AtomicU64,
    pub(crate) sessions_opened: AtomicU64,
    pub(crate) sessions_rejected: AtomicU64,
    pub(crate) commands_received: AtomicU64,
    pub(crate) commands_dropped: AtomicU64,
    pub(crate) stale_reads: AtomicU64,
    pub(crate) send_failures: AtomicU64,
    pub(crate) stream_failures: AtomicU64,
    pub(crate) streams_finished: AtomicU64,
    pub(crate) teardowns_completed: AtomicU64,
    pub(crate) teardowns_timed_out: AtomicU64,
    pub(crate) probes_succeeded: AtomicU64,
    pub(crate) probes_failed: AtomicU64,
    pub(crate) registrations_failed: AtomicU64,
}

impl LinkMetrics {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot of every counter.
    pub fn snapshot(&self) -> LinkStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        LinkStats {
            endpoints_registered: get(&self.endpoints_registered),
            sessions_opened: get(&self.sessions_opened),
            sessions_rejected: get(&self.sessions_rejected),
            commands_received: get(&self.commands_received),
            commands_dropped: get(&self.commands_dropped),
            stale_reads: get(&self.stale_reads),
            send_failures: get(&self.send_failures),
            stream_failures: get(&self.stream_failures),
            streams_finished: get(&self.streams_finished),
            teardowns_completed: get(&self.teardowns_completed),
            teardowns_timed_out: get(&self.teardowns_timed_out),
            probes_succeeded: get(&self.probes_succeeded),
            probes_failed: get(&self.probes_failed),
            registrations_failed: get(&self.registrations_failed),
        }
    }
}

/// Cumulative link counters at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Endpoints added to the registry.
    pub endpoints_registered: u64,
    /// Guidance sessions opened.
    pub sessions_opened: u64,
    /// `establish` calls that created no session.
    pub sessions_rejected: u64,
    /// Commands stored in the command buffer.
    pub commands_received: u64,
    /// Commands that arrived after their missile's buffer was released.
    pub commands_dropped: u64,
    /// `consume_latest` calls that returned an already-consumed sequence id.
    pub stale_reads: u64,
    /// Telemetry sends that failed synchronously.
    pub send_failures: u64,
    /// Streams that ended with an error.
    pub stream_failures: u64,
    /// Streams the server finished normally.
    pub streams_finished: u64,
    /// Teardowns whose completion signal fired in time.
    pub teardowns_completed: u64,
    /// Teardowns that gave up waiting for the server.
    pub teardowns_timed_out: u64,
    /// Health requests that succeeded.
    pub probes_succeeded: u64,
    /// Health requests that failed.
    pub probes_failed: u64,
    /// Registration calls that failed or timed out.
    pub registrations_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let s = LinkMetrics::default().snapshot();
        assert_eq!(s, LinkStats::default());
        assert_eq!(s.commands_received, 0);
        assert_eq!(s.stale_reads, 0);
        assert_eq!(s.teardowns_timed_out, 0);
    }

    #[test]
    fn bump_is_visible_in_snapshot() {
        let m = LinkMetrics::default();
        LinkMetrics::bump(&m.stale_reads);
        LinkMetrics::bump(&m.stale_reads);
        LinkMetrics::bump(&m.probes_failed);
        let s = m.snapshot();
        assert_eq!(s.stale_reads, 2);
        assert_eq!(s.probes_failed, 1);
        assert_eq!(s.probes_succeeded, 0);
    }
}
