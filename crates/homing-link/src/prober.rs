//! Liveness probing of registered endpoints.
//!
//! Transports connect lazily, so without priming the first session on a
//! channel would pay full connection setup on its first tick. Probes
//! force that setup early and surface dead endpoints in the logs.
//! Failures are informational: the channel stays registered.

use std::sync::Arc;
use std::time::Duration;

use homing_core::{ConnectionId, TransportError};

use crate::metrics::LinkMetrics;
use crate::registry::EndpointRegistry;

/// Result of one probe sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Endpoints that answered.
    pub healthy: Vec<ConnectionId>,
    /// Endpoints that did not, with the reason.
    pub failed: Vec<(ConnectionId, TransportError)>,
}

/// Issues health requests against registered channels.
pub struct LivenessProber {
    registry: Arc<EndpointRegistry>,
    deadline: Duration,
    metrics: Arc<LinkMetrics>,
}

impl LivenessProber {
    /// A prober with a per-request `deadline`.
    pub fn new(
        registry: Arc<EndpointRegistry>,
        deadline: Duration,
        metrics: Arc<LinkMetrics>,
    ) -> Self {
        Self {
            registry,
            deadline,
            metrics,
        }
    }

    /// Probe one endpoint. `None` if `id` is not registered.
    pub fn probe(&self, id: ConnectionId) -> Option<Result<(), TransportError>> {
        let channel = self.registry.channel_for(id)?;
        let result = channel.health_check(self.deadline);
        match &result {
            Ok(()) => {
                LinkMetrics::bump(&self.metrics.probes_succeeded);
                log::debug!("guidance endpoint {id} ({}) is healthy", channel.endpoint());
            }
            Err(e) => {
                LinkMetrics::bump(&self.metrics.probes_failed);
                log::warn!(
                    "guidance endpoint {id} ({}) failed health check: {e}",
                    channel.endpoint()
                );
            }
        }
        Some(result)
    }

    /// Probe every registered endpoint in registration order.
    pub fn probe_all(&self) -> ProbeReport {
        let mut report = ProbeReport::default();
        for (id, _) in self.registry.channels() {
            match self.probe(id) {
                Some(Ok(())) => report.healthy.push(id),
                Some(Err(e)) => report.failed.push((id, e)),
                // Cleared between listing and probing.
                None => {}
            }
        }
        report
    }
}
