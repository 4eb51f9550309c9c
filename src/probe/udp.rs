use socket2::{SockAddr, Socket};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tracing::trace;

use crate::error::TraceError;
use crate::probe::socket::{create_udp_dgram_socket, set_ttl};

/// A probe that has left the host
///
/// Holds the transmitting socket open until the hop's round is over; the
/// socket is closed when this value is dropped.
#[derive(Debug)]
pub struct SentProbe {
    ttl: u8,
    _socket: Option<Socket>,
}

impl SentProbe {
    pub fn new(ttl: u8, socket: Socket) -> Self {
        Self {
            ttl,
            _socket: Some(socket),
        }
    }

    /// Probe sent by a transport that keeps no per-probe socket
    pub fn detached(ttl: u8) -> Self {
        Self { ttl, _socket: None }
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }
}

/// Resolve a trace target to the IPv4 destination for UDP probes
pub async fn resolve_target(target: &str, port: u16) -> Result<SocketAddrV4, TraceError> {
    let target = target.trim();

    // Try parsing as IP address first
    if let Ok(ip) = target.parse::<Ipv4Addr>() {
        return Ok(SocketAddrV4::new(ip, port));
    }

    let mut addrs = tokio::net::lookup_host((target, port))
        .await
        .map_err(|source| TraceError::Resolve {
            target: target.to_string(),
            source,
        })?;

    addrs
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| TraceError::NoIpv4Address(target.to_string()))
}

/// Send one zero-length UDP probe to `destination` that expires after `ttl` hops
pub fn send_udp_probe(destination: SocketAddrV4, ttl: u8) -> Result<SentProbe, TraceError> {
    let socket = create_udp_dgram_socket().map_err(TraceError::SocketCreation)?;
    set_ttl(&socket, ttl).map_err(|source| TraceError::SetTtl { ttl, source })?;
    socket
        .connect(&SockAddr::from(destination))
        .map_err(|source| TraceError::Connect {
            addr: destination,
            source,
        })?;
    socket
        .send(&[])
        .map_err(|source| TraceError::Write { ttl, source })?;

    trace!(%destination, ttl, "probe sent");
    Ok(SentProbe::new(ttl, socket))
}
