//! Unprivileged UDP traceroute.
//!
//! A [`Tracer`] sends one zero-length UDP probe per TTL from an ordinary
//! connected datagram socket and waits for the ICMP Time Exceeded or
//! Destination Unreachable reply. Hops are returned in TTL order and also
//! streamed live to subscribers.
//!
//! ```no_run
//! # async fn demo() -> Result<(), hoptrace::TraceAbort> {
//! let mut config = hoptrace::Config::new("example.com");
//! config.dns_enabled = false;
//! let result = hoptrace::Tracer::new(config).trace().await?;
//! for hop in &result.hops {
//!     println!("{} {} {:.1}ms", hop.ttl, hop.address, hop.latency_ms);
//! }
//! # Ok(())
//! # }
//! ```

// Public API - configuration, data types, probes and the trace engine
pub mod config;
pub mod error;
pub mod export;
pub mod probe;
pub mod state;
pub mod trace;

// Internal implementation - not part of public API
pub(crate) mod lookup;

pub use config::{Config, ConfigError};
pub use error::{ListenError, TraceAbort, TraceError};
pub use probe::{Listener, Reply, ReplyKind, SentProbe, Transport, UdpTransport};
pub use state::{Hop, NO_REPLY_ADDRESS, Termination, TraceEvent, TraceResult};
pub use trace::Tracer;
