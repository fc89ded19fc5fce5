//! Domain types shared by the retro filter client crates.

pub mod error;
pub mod filter;
pub mod job;
pub mod liveness;
pub mod png;
