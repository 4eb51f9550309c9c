//! Seams between the trace engine and the network.
//!
//! The engine drives a [`Transport`] one hop at a time: it opens a
//! [`Listener`] first so that fast replies are not missed, hands the
//! listener to a blocking worker, then sends the probe.

use std::net::SocketAddrV4;
use std::time::Duration;

use crate::error::{ListenError, TraceError};
use crate::probe::icmp::{IcmpListener, Reply};
use crate::probe::udp::{SentProbe, send_udp_probe};

/// Sends probes and opens listeners for their replies
pub trait Transport: Send + Sync + 'static {
    type Listener: Listener;

    /// Open a listener whose single read is bounded by `timeout`.
    ///
    /// Returns `Err` for setup failures that should abort the trace.
    fn listen(&self, timeout: Duration) -> Result<Self::Listener, TraceError>;

    /// Send one probe toward `destination` that expires after `ttl` hops.
    fn send_probe(&self, destination: SocketAddrV4, ttl: u8) -> Result<SentProbe, TraceError>;
}

/// A ready-to-read listener for one hop
pub trait Listener: Send + 'static {
    /// Block until a reply arrives or the read deadline passes.
    fn receive(self) -> Result<Reply, ListenError>;
}

/// Production transport: connected UDP probe sockets and an ICMP receive socket
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransport;

impl Transport for UdpTransport {
    type Listener = IcmpListener;

    fn listen(&self, timeout: Duration) -> Result<IcmpListener, TraceError> {
        IcmpListener::open(timeout)
    }

    fn send_probe(&self, destination: SocketAddrV4, ttl: u8) -> Result<SentProbe, TraceError> {
        send_udp_probe(destination, ttl)
    }
}
