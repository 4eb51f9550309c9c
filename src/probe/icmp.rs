use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::udp::UdpPacket;
use socket2::Socket;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use tracing::trace;

use crate::error::{ListenError, TraceError};
use crate::probe::socket::{RECV_BUFFER_SIZE, create_recv_socket, recv_from};
use crate::probe::transport::Listener;

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;
/// Minimum IPv4 header size
pub const IPV4_HEADER_SIZE: usize = 20;

/// How a received ICMP message is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// The probe expired at an intermediate router
    TimeExceeded,
    /// The probe reached the end of the reachable path
    DestinationUnreachable,
    /// Any other ICMP type (raw type value)
    Unexpected(u8),
}

/// A parsed ICMP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub responder: Ipv4Addr,
    pub kind: ReplyKind,
    pub code: u8,
    /// Destination of the UDP datagram quoted in an ICMP error, if present
    pub quoted_destination: Option<SocketAddrV4>,
}

impl Reply {
    pub fn new(responder: Ipv4Addr, kind: ReplyKind) -> Self {
        Self {
            responder,
            kind,
            code: 0,
            quoted_destination: None,
        }
    }
}

/// Parse an ICMP message received from `responder`
///
/// When `is_dgram` is true, the packet starts directly at the ICMP header;
/// raw sockets deliver the IPv4 header first.
pub fn parse_icmp_reply(
    data: &[u8],
    responder: Ipv4Addr,
    is_dgram: bool,
) -> Result<Reply, ListenError> {
    let icmp = if is_dgram {
        data
    } else {
        strip_ipv4_header(data)?
    };

    if icmp.len() < ICMP_HEADER_SIZE {
        return Err(ListenError::Parse(format!(
            "ICMP message truncated: {} bytes",
            icmp.len()
        )));
    }
    let packet = IcmpPacket::new(icmp)
        .ok_or_else(|| ListenError::Parse("ICMP header unreadable".to_string()))?;

    let icmp_type = packet.get_icmp_type();
    let kind = if icmp_type == IcmpTypes::TimeExceeded {
        ReplyKind::TimeExceeded
    } else if icmp_type == IcmpTypes::DestinationUnreachable {
        ReplyKind::DestinationUnreachable
    } else {
        ReplyKind::Unexpected(icmp_type.0)
    };

    // Error messages quote the original IP header plus 8 bytes of the datagram
    let quoted_destination = match kind {
        ReplyKind::Unexpected(_) => None,
        _ => quoted_udp_destination(&icmp[ICMP_HEADER_SIZE..]),
    };

    Ok(Reply {
        responder,
        kind,
        code: packet.get_icmp_code().0,
        quoted_destination,
    })
}

fn strip_ipv4_header(data: &[u8]) -> Result<&[u8], ListenError> {
    let ip = Ipv4Packet::new(data).ok_or_else(|| {
        ListenError::Parse(format!("IPv4 header truncated: {} bytes", data.len()))
    })?;
    let header_len = ip.get_header_length() as usize * 4;
    if header_len < IPV4_HEADER_SIZE || header_len > data.len() {
        return Err(ListenError::Parse(format!(
            "invalid IPv4 header length {}",
            header_len
        )));
    }
    Ok(&data[header_len..])
}

/// Extract the destination of the UDP datagram an ICMP error refers to
fn quoted_udp_destination(original: &[u8]) -> Option<SocketAddrV4> {
    let ip = Ipv4Packet::new(original)?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Udp {
        return None;
    }
    let header_len = ip.get_header_length() as usize * 4;
    if header_len < IPV4_HEADER_SIZE {
        return None;
    }
    let udp = UdpPacket::new(original.get(header_len..)?)?;
    Some(SocketAddrV4::new(ip.get_destination(), udp.get_destination()))
}

/// Listener reading ICMP replies from a socket opened before the probe is sent
#[derive(Debug)]
pub struct IcmpListener {
    socket: Socket,
    is_dgram: bool,
    timeout: Duration,
}

impl IcmpListener {
    /// Open the listening socket with a read deadline of `timeout`
    pub fn open(timeout: Duration) -> Result<Self, TraceError> {
        let info = create_recv_socket(timeout).map_err(TraceError::ListenSocket)?;
        Ok(Self {
            socket: info.socket,
            is_dgram: info.is_dgram,
            timeout,
        })
    }
}

impl Listener for IcmpListener {
    fn receive(self) -> Result<Reply, ListenError> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, peer) = recv_from(&self.socket, &mut buffer)
            .map_err(|e| ListenError::from_read(e, self.timeout))?;
        let responder =
            peer.ok_or_else(|| ListenError::Parse("reply from a non-IPv4 sender".to_string()))?;

        let reply = parse_icmp_reply(&buffer[..len], responder, self.is_dgram)?;
        trace!(
            responder = %reply.responder,
            kind = ?reply.kind,
            code = reply.code,
            quoted = ?reply.quoted_destination,
            "ICMP reply received"
        );
        Ok(reply)
    }
}
