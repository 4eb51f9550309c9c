pub mod hop;
pub mod session;

pub use hop::*;
pub use session::*;
