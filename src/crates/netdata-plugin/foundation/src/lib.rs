//! Foundational utilities for Netdata plugins.
//!
//! This crate provides low-level primitives that the job orchestration
//! runtime builds upon.

// Wall-clock aligned logical clock
pub mod ticker;
pub use ticker::Ticker;
