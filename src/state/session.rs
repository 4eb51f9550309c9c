use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddrV4;

use crate::state::Hop;

/// Why a trace stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// An ICMP Destination Unreachable ended the path
    DestinationUnreachable,
    /// Every TTL up to the configured maximum was probed
    MaxTtlReached,
    /// No reply arrived within the per-hop timeout
    NoReply,
    /// An ICMP message of another type arrived
    UnexpectedReply,
    /// The listener failed to read or parse a reply
    ListenerFailed,
    /// The trace was cancelled through its tracer
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Termination::DestinationUnreachable => "destination unreachable",
            Termination::MaxTtlReached => "max TTL reached",
            Termination::NoReply => "no reply",
            Termination::UnexpectedReply => "unexpected ICMP reply",
            Termination::ListenerFailed => "listener failed",
            Termination::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Hops collected by one trace invocation, in TTL order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    /// Target as configured
    pub target: String,
    /// Resolved probe destination
    pub destination: Option<SocketAddrV4>,
    pub started_at: DateTime<Utc>,
    pub hops: Vec<Hop>,
    /// Set once the trace ends successfully; `None` for aborted traces
    pub termination: Option<Termination>,
}

impl TraceResult {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            destination: None,
            started_at: Utc::now(),
            hops: Vec::new(),
            termination: None,
        }
    }

    /// Last recorded hop
    pub fn last_hop(&self) -> Option<&Hop> {
        self.hops.last()
    }

    /// True when the trace ended at a Destination Unreachable reply
    pub fn reached_end(&self) -> bool {
        self.termination == Some(Termination::DestinationUnreachable)
    }
}

/// Item published on a tracer's live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A hop was recorded
    Hop(Hop),
    /// The trace ended successfully; no further events for this trace
    Finished { termination: Termination },
    /// The trace stopped with an error; no further events for this trace
    Aborted { reason: String },
}

impl TraceEvent {
    /// True for the end-of-trace markers
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TraceEvent::Hop(_))
    }
}
