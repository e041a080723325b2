//! Shared availability data models consumed by the resolver core and the
//! snapshot provider crates.

pub mod availability;
pub mod channel;

pub use availability::*;
pub use channel::*;
