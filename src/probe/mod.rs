pub mod icmp;
pub mod socket;
pub mod transport;
pub mod udp;

pub use icmp::*;
pub use socket::*;
pub use transport::*;
pub use udp::*;
