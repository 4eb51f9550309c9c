//! Error types for trace operations.
//!
//! [`TraceError`] covers failures that abort a trace. [`ListenError`] covers
//! failures of a single hop's listening attempt; those never abort a trace,
//! the engine records a `*` hop (or none) and stops the trace successfully.

use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::state::TraceResult;

/// Failure that aborts a whole trace
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("a trace is already running on this tracer")]
    Busy,

    #[error("failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("no IPv4 address found for {0}")]
    NoIpv4Address(String),

    #[error("failed to create probe socket: {0}")]
    SocketCreation(#[source] io::Error),

    #[error("failed to set TTL {ttl}: {source}")]
    SetTtl {
        ttl: u8,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect probe socket to {addr}: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("failed to send probe with TTL {ttl}: {source}")]
    Write {
        ttl: u8,
        #[source]
        source: io::Error,
    },

    #[error("failed to open ICMP listener: {0}")]
    ListenSocket(#[source] io::Error),
}

/// Failure of one hop's listening attempt
#[derive(Error, Debug)]
pub enum ListenError {
    #[error("no ICMP reply within {0:?}")]
    Timeout(Duration),

    #[error("failed to read ICMP reply: {0}")]
    Read(#[source] io::Error),

    #[error("failed to parse ICMP reply: {0}")]
    Parse(String),

    #[error("listener worker failed: {0}")]
    Worker(String),
}

impl ListenError {
    /// Map a socket read error, treating an expired read deadline as a timeout
    pub fn from_read(err: io::Error, timeout: Duration) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ListenError::Timeout(timeout),
            _ => ListenError::Read(err),
        }
    }

    /// True when no reply arrived in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, ListenError::Timeout(_))
    }
}

/// A trace that stopped with an error, together with the hops collected before it
#[derive(Error, Debug)]
#[error("trace aborted after {} hop(s)", .partial.hops.len())]
pub struct TraceAbort {
    #[source]
    pub error: TraceError,
    pub partial: TraceResult,
}

impl TraceAbort {
    pub fn new(error: TraceError, partial: TraceResult) -> Self {
        Self { error, partial }
    }

    /// True when the trace was rejected before any network I/O
    pub fn is_config_error(&self) -> bool {
        matches!(self.error, TraceError::InvalidConfig(_) | TraceError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_timeout_mapping() {
        let timeout = Duration::from_secs(3);
        let would_block = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(ListenError::from_read(would_block, timeout).is_timeout());

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert!(ListenError::from_read(timed_out, timeout).is_timeout());

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let err = ListenError::from_read(refused, timeout);
        assert!(!err.is_timeout());
        assert!(matches!(err, ListenError::Read(_)));
    }

    #[test]
    fn test_abort_keeps_partial_result() {
        let abort = TraceAbort::new(
            TraceError::ListenSocket(io::Error::from(io::ErrorKind::PermissionDenied)),
            TraceResult::new("10.0.0.1"),
        );
        assert_eq!(abort.to_string(), "trace aborted after 0 hop(s)");
        assert!(!abort.is_config_error());
        assert!(std::error::Error::source(&abort).is_some());
    }

    #[test]
    fn test_config_error_display() {
        let err = TraceError::from(ConfigError::StartTtlTooLow);
        assert_eq!(
            err.to_string(),
            "invalid configuration: start TTL must be at least 1"
        );
    }
}
