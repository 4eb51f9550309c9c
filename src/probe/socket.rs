use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use tracing::debug;

/// Receive buffer size (one Ethernet MTU)
pub const RECV_BUFFER_SIZE: usize = 1500;

/// Socket with metadata about type (for DGRAM-aware parsing)
#[derive(Debug)]
pub struct SocketInfo {
    pub socket: Socket,
    /// True if SOCK_DGRAM (no IP header in received packets)
    pub is_dgram: bool,
}

/// Create a DGRAM UDP socket for sending probes (no privileges required)
pub fn create_udp_dgram_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Create an unprivileged ICMP socket (SOCK_DGRAM)
pub fn create_dgram_icmp_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Create a raw ICMP socket (receive only, never used to send)
pub fn create_raw_icmp_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Create a socket for receiving ICMP replies on all local interfaces
///
/// Routers' Time Exceeded and Unreachable messages are only delivered to raw
/// ICMP sockets on Linux and macOS, so a raw receive socket is preferred when
/// the process may open one. Otherwise falls back to the unprivileged ICMP
/// datagram socket.
pub fn create_recv_socket(timeout: Duration) -> io::Result<SocketInfo> {
    let info = match create_raw_icmp_socket() {
        Ok(socket) => SocketInfo {
            socket,
            is_dgram: false,
        },
        Err(e) => {
            debug!(error = %e, "raw ICMP socket unavailable, using unprivileged ICMP socket");
            SocketInfo {
                socket: create_dgram_icmp_socket()?,
                is_dgram: true,
            }
        }
    };

    let any = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
    info.socket.bind(&SockAddr::from(any))?;
    info.socket.set_read_timeout(Some(timeout))?;
    Ok(info)
}

/// Set TTL on a socket
pub fn set_ttl(socket: &Socket, ttl: u8) -> io::Result<()> {
    socket.set_ttl(ttl as u32)
}

/// Receive one datagram, returning its length and the sender's IPv4 address
///
/// The sender of the queued datagram is peeked first (this is where the read
/// deadline applies); the read then consumes that same datagram.
pub fn recv_from(socket: &Socket, buffer: &mut [u8]) -> io::Result<(usize, Option<Ipv4Addr>)> {
    let peer = socket.peek_sender()?;
    let mut reader = socket;
    let len = reader.read(buffer)?;
    Ok((len, peer.as_socket_ipv4().map(|addr| *addr.ip())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_socket_ttl() {
        let socket = create_udp_dgram_socket().expect("UDP sockets need no privileges");
        set_ttl(&socket, 7).unwrap();
        assert_eq!(socket.ttl().unwrap(), 7);
    }

    #[test]
    fn test_recv_from_loopback() {
        let receiver = create_udp_dgram_socket().unwrap();
        receiver
            .bind(&SockAddr::from(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)))
            .unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        let local = receiver.local_addr().unwrap();

        let sender = create_udp_dgram_socket().unwrap();
        sender.send_to(b"hop", &local).unwrap();

        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, peer) = recv_from(&receiver, &mut buffer).unwrap();
        assert_eq!(&buffer[..len], b"hop");
        assert_eq!(peer, Some(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_recv_from_consumes_one_datagram_per_call() {
        let receiver = create_udp_dgram_socket().unwrap();
        receiver
            .bind(&SockAddr::from(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)))
            .unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        let local = receiver.local_addr().unwrap();

        let sender = create_udp_dgram_socket().unwrap();
        sender.send_to(b"first", &local).unwrap();
        sender.send_to(b"second", &local).unwrap();

        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, _) = recv_from(&receiver, &mut buffer).unwrap();
        assert_eq!(&buffer[..len], b"first");
        let (len, peer) = recv_from(&receiver, &mut buffer).unwrap();
        assert_eq!(&buffer[..len], b"second");
        assert_eq!(peer, Some(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_recv_from_times_out() {
        let receiver = create_udp_dgram_socket().unwrap();
        receiver
            .bind(&SockAddr::from(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)))
            .unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut buffer = [0u8; 64];
        let err = recv_from(&receiver, &mut buffer).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }
}
