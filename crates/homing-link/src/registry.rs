//! Endpoint registry: one reusable channel per connection id.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use homing_core::{ConnectionId, TransportError};
use indexmap::IndexMap;

use crate::config::LinkConfig;
use crate::transport::{Channel, Transport};

// ── RegistryError ────────────────────────────────────────────────

/// Errors from [`EndpointRegistry::register_endpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A channel already exists for this id.
    AlreadyRegistered {
        /// The duplicate id.
        id: ConnectionId,
    },
    /// The transport refused to create a channel.
    Transport {
        /// The id being registered.
        id: ConnectionId,
        /// Underlying failure.
        source: TransportError,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { id } => {
                write!(f, "endpoint for connection {id} already registered")
            }
            Self::Transport { id, source } => {
                write!(f, "cannot create channel for connection {id}: {source}")
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            Self::AlreadyRegistered { .. } => None,
        }
    }
}

// ── EndpointRegistry ─────────────────────────────────────────────

/// Maps connection ids to channels and owns the channels' lifetime.
///
/// Channels are created lazily by the transport, so registration never
/// performs network I/O and the write lock is held only for the insert.
pub struct EndpointRegistry {
    config: LinkConfig,
    transport: Arc<dyn Transport>,
    channels: RwLock<IndexMap<ConnectionId, Arc<dyn Channel>>>,
}

impl EndpointRegistry {
    /// An empty registry resolving addresses through `config`.
    pub fn new(config: LinkConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            channels: RwLock::new(IndexMap::new()),
        }
    }

    /// Create and store the channel for `id`.
    pub fn register_endpoint(&self, id: ConnectionId) -> Result<Arc<dyn Channel>, RegistryError> {
        if self.has_endpoint(id) {
            return Err(RegistryError::AlreadyRegistered { id });
        }
        let address = self.config.server_address(id);
        let channel = self
            .transport
            .connect(&address)
            .map_err(|source| RegistryError::Transport { id, source })?;

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        // Lost a race with a concurrent registration of the same id.
        if channels.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered { id });
        }
        channels.insert(id, Arc::clone(&channel));
        log::info!("registered guidance endpoint {id} at {address}");
        Ok(channel)
    }

    /// Whether a channel exists for `id`.
    pub fn has_endpoint(&self, id: ConnectionId) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// The channel for `id`, if registered.
    pub fn channel_for(&self, id: ConnectionId) -> Option<Arc<dyn Channel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Every registered channel, in registration order.
    pub fn channels(&self) -> Vec<(ConnectionId, Arc<dyn Channel>)> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, ch)| (*id, Arc::clone(ch)))
            .collect()
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no endpoint is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every channel. Returns how many were registered.
    pub fn clear(&self) -> usize {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let n = channels.len();
        channels.clear();
        n
    }

    /// The configuration addresses are resolved from.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}
