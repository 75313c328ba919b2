//! Link configuration, validation, and error types.
//!
//! [`LinkConfig`] is the input for constructing a
//! [`GuidanceLink`](crate::link::GuidanceLink).
//! [`from_env()`](LinkConfig::from_env) reads the addressing values from
//! the process environment; [`validate()`](LinkConfig::validate) checks
//! structural invariants at startup. Both failures are fatal to the
//! caller: there is no sensible fallback address for a guidance server.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use homing_core::ConnectionId;

use crate::registry::RegistryError;

/// Environment variable holding the guidance server port.
pub const ENV_PORT: &str = "HOMING_GUIDANCE_PORT";
/// Environment variable holding the address prefix.
pub const ENV_ADDRESS_PREFIX: &str = "HOMING_GUIDANCE_ADDRESS_PREFIX";
/// Environment variable selecting the loopback override.
pub const ENV_LOOPBACK: &str = "HOMING_GUIDANCE_LOOPBACK";
/// Environment variable listing connection ids, comma separated.
pub const ENV_CONNECTION_IDS: &str = "HOMING_GUIDANCE_CONNECTION_IDS";

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while loading or validating a [`LinkConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A mandatory environment variable is not set.
    MissingVariable {
        /// Name of the variable.
        name: &'static str,
    },
    /// A variable is set but cannot be parsed.
    InvalidValue {
        /// Name of the variable.
        name: &'static str,
        /// The offending value.
        value: String,
    },
    /// Port 0 is not a usable server port.
    ZeroPort,
    /// No loopback override and no address prefix.
    EmptyAddressPrefix,
    /// No connection ids configured.
    NoConnectionIds,
    /// A connection id appears more than once.
    DuplicateConnectionId {
        /// The repeated id.
        id: ConnectionId,
    },
    /// A duration that must be positive is zero.
    ZeroDuration {
        /// Which setting.
        field: &'static str,
    },
    /// The per-stream outbound queue capacity is zero.
    OutboundCapacityZero,
    /// A configured endpoint could not be registered.
    Endpoint(RegistryError),
    /// The background link worker could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVariable { name } => write!(f, "environment variable {name} is not set"),
            Self::InvalidValue { name, value } => {
                write!(f, "environment variable {name} has invalid value {value:?}")
            }
            Self::ZeroPort => write!(f, "port must be non-zero"),
            Self::EmptyAddressPrefix => {
                write!(f, "address prefix is empty and loopback is not enabled")
            }
            Self::NoConnectionIds => write!(f, "no connection ids configured"),
            Self::DuplicateConnectionId { id } => {
                write!(f, "connection id {id} configured more than once")
            }
            Self::ZeroDuration { field } => write!(f, "{field} must be greater than zero"),
            Self::OutboundCapacityZero => write!(f, "outbound_capacity must be at least 1"),
            Self::Endpoint(e) => write!(f, "endpoint: {e}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Endpoint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for ConfigError {
    fn from(e: RegistryError) -> Self {
        Self::Endpoint(e)
    }
}

// ── LinkConfig ─────────────────────────────────────────────────────

/// Complete configuration for the guidance link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    /// Guidance server port, shared by every endpoint.
    pub port: u16,
    /// Host prefix; the connection id is appended to it.
    pub address_prefix: String,
    /// Route every endpoint to `127.0.0.1`.
    pub loopback: bool,
    /// Endpoints registered at construction.
    pub connection_ids: Vec<ConnectionId>,
    /// Interval between liveness sweeps. Default: 30s.
    pub probe_interval: Duration,
    /// Deadline for a single health request. Default: 2s.
    pub probe_deadline: Duration,
    /// Deadline for the registration call. Default: 500ms.
    pub register_deadline: Duration,
    /// How long teardown waits for the server to finish a stream. Default: 60s.
    pub teardown_timeout: Duration,
    /// Telemetry messages queued per stream before sends fail. Default: 64.
    pub outbound_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: 42069,
            address_prefix: "guidance-control".to_string(),
            loopback: false,
            connection_ids: vec![ConnectionId(0)],
            probe_interval: Duration::from_secs(30),
            probe_deadline: Duration::from_secs(2),
            register_deadline: Duration::from_millis(500),
            teardown_timeout: Duration::from_secs(60),
            outbound_capacity: 64,
        }
    }
}

impl LinkConfig {
    /// Load addressing from the process environment.
    ///
    /// Timing settings keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load addressing through an arbitrary variable lookup.
    ///
    /// `HOMING_GUIDANCE_PORT` and `HOMING_GUIDANCE_CONNECTION_IDS` are
    /// mandatory. The prefix is mandatory unless loopback is enabled.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port_raw = lookup(ENV_PORT).ok_or(ConfigError::MissingVariable { name: ENV_PORT })?;
        let port = port_raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                name: ENV_PORT,
                value: port_raw.clone(),
            })?;

        let loopback = match lookup(ENV_LOOPBACK) {
            None => false,
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                name: ENV_LOOPBACK,
                value: raw,
            })?,
        };

        let address_prefix = match lookup(ENV_ADDRESS_PREFIX) {
            Some(prefix) => prefix.trim().to_string(),
            None if loopback => String::new(),
            None => {
                return Err(ConfigError::MissingVariable {
                    name: ENV_ADDRESS_PREFIX,
                })
            }
        };

        let ids_raw = lookup(ENV_CONNECTION_IDS).ok_or(ConfigError::MissingVariable {
            name: ENV_CONNECTION_IDS,
        })?;
        let connection_ids = parse_connection_ids(&ids_raw)?;

        let config = Self {
            port,
            address_prefix,
            loopback,
            connection_ids,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if !self.loopback && self.address_prefix.is_empty() {
            return Err(ConfigError::EmptyAddressPrefix);
        }
        if self.connection_ids.is_empty() {
            return Err(ConfigError::NoConnectionIds);
        }
        for (i, id) in self.connection_ids.iter().enumerate() {
            if self.connection_ids[..i].contains(id) {
                return Err(ConfigError::DuplicateConnectionId { id: *id });
            }
        }
        for (field, value) in [
            ("probe_interval", self.probe_interval),
            ("probe_deadline", self.probe_deadline),
            ("register_deadline", self.register_deadline),
            ("teardown_timeout", self.teardown_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::OutboundCapacityZero);
        }
        Ok(())
    }

    /// Resolve the server address for one connection id.
    pub fn server_address(&self, id: ConnectionId) -> String {
        if self.loopback {
            format!("127.0.0.1:{}", self.port)
        } else {
            format!("{}{}:{}", self.address_prefix, id, self.port)
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_connection_ids(raw: &str) -> Result<Vec<ConnectionId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map(ConnectionId)
                .map_err(|_| ConfigError::InvalidValue {
                    name: ENV_CONNECTION_IDS,
                    value: s.to_string(),
                })
        })
        .collect()
}
