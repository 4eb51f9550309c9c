pub mod engine;
pub mod task;

pub use engine::*;
pub use task::*;
