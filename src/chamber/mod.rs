//! Chambers: contained reward sources, their storage and their owner's roster.

pub mod roster;
pub mod types;

pub use roster::*;
pub use types::*;
