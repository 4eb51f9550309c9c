use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default destination port for UDP probes (classic traceroute base port)
pub const DEFAULT_PORT: u16 = 33434;
/// Default first TTL to probe
pub const DEFAULT_START_TTL: u8 = 1;
/// Default last TTL to probe
pub const DEFAULT_MAX_TTL: u8 = 30;
/// Default time to wait for an ICMP reply per hop
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default capacity of the live event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration rejected before any network I/O
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target address must be specified")]
    MissingTarget,

    #[error("start TTL must be at least 1")]
    StartTtlTooLow,

    #[error("start TTL {start_ttl} is greater than max TTL {max_ttl}")]
    InvalidTtlRange { start_ttl: u8, max_ttl: u8 },

    #[error("port must be between 1 and 65535")]
    InvalidPort,

    #[error("per-hop timeout must be greater than zero")]
    ZeroTimeout,
}

/// Tracer configuration, fixed for the duration of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trace target (hostname or IPv4 address)
    pub target: String,
    /// Destination port for UDP probes
    pub port: u16,
    /// First TTL to probe
    pub start_ttl: u8,
    /// Last TTL to probe
    pub max_ttl: u8,
    /// Time to wait for a reply at each hop
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Enable reverse DNS lookups of hop addresses
    pub dns_enabled: bool,
    /// Capacity of the live event channel
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: String::new(),
            port: DEFAULT_PORT,
            start_ttl: DEFAULT_START_TTL,
            max_ttl: DEFAULT_MAX_TTL,
            timeout: DEFAULT_TIMEOUT,
            dns_enabled: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Config {
    /// Default configuration for the given target
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Check the invariants a trace relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::MissingTarget);
        }
        if self.start_ttl < 1 {
            return Err(ConfigError::StartTtlTooLow);
        }
        if self.start_ttl > self.max_ttl {
            return Err(ConfigError::InvalidTtlRange {
                start_ttl: self.start_ttl,
                max_ttl: self.max_ttl,
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Live channel capacity, never smaller than one full trace plus its end marker
    pub fn channel_capacity(&self) -> usize {
        self.event_capacity.max(self.max_ttl as usize + 1)
    }

    /// Number of TTLs a full trace probes
    pub fn hop_budget(&self) -> usize {
        (self.max_ttl as usize + 1).saturating_sub(self.start_ttl as usize)
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
