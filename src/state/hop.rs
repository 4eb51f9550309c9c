use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Address recorded for a hop that produced no usable reply
pub const NO_REPLY_ADDRESS: &str = "*";

/// A single observed hop (one TTL) on the path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    /// TTL the probe was sent with
    pub ttl: u8,
    /// Responder address, or `*` when nothing usable arrived
    pub address: String,
    /// Reverse DNS name(s), empty when lookup is disabled or failed
    pub host: String,
    /// Milliseconds between sending the probe and the listener finishing
    pub latency_ms: f64,
    /// True only when the responder reported the probe's TTL expired in transit
    pub reachable: bool,
}

impl Hop {
    /// Hop answered by `responder`
    pub fn replied(ttl: u8, responder: Ipv4Addr, latency: Duration, reachable: bool) -> Self {
        Self {
            ttl,
            address: responder.to_string(),
            host: String::new(),
            latency_ms: latency_ms(latency),
            reachable,
        }
    }

    /// Hop with no usable reply (timeout or listener failure)
    pub fn silent(ttl: u8, waited: Duration) -> Self {
        Self {
            ttl,
            address: NO_REPLY_ADDRESS.to_string(),
            host: String::new(),
            latency_ms: latency_ms(waited),
            reachable: false,
        }
    }

    /// Attach a resolved host name
    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    /// Whether a responder address was recorded
    pub fn responded(&self) -> bool {
        self.address != NO_REPLY_ADDRESS
    }

    /// Responder address as an IP, if any
    pub fn ip(&self) -> Option<IpAddr> {
        self.address.parse().ok()
    }
}

fn latency_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replied_hop() {
        let hop = Hop::replied(3, Ipv4Addr::new(10, 0, 0, 1), Duration::from_micros(1500), true);
        assert_eq!(hop.ttl, 3);
        assert_eq!(hop.address, "10.0.0.1");
        assert_eq!(hop.host, "");
        assert!((hop.latency_ms - 1.5).abs() < 1e-9);
        assert!(hop.reachable);
        assert!(hop.responded());
        assert_eq!(hop.ip(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
    }

    #[test]
    fn test_silent_hop() {
        let hop = Hop::silent(7, Duration::from_secs(3));
        assert_eq!(hop.address, NO_REPLY_ADDRESS);
        assert!(!hop.reachable);
        assert!(!hop.responded());
        assert_eq!(hop.ip(), None);
        assert!((hop.latency_ms - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_with_host() {
        let hop = Hop::replied(1, Ipv4Addr::LOCALHOST, Duration::from_millis(1), false)
            .with_host("localhost".to_string());
        assert_eq!(hop.host, "localhost");
    }
}
