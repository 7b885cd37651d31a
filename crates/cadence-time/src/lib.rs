//! Cadence Time - when a queued message may be processed
//!
//! This crate implements:
//! - The server clock (monotonic, integer milliseconds)
//! - The QoS policy and its admission gate
//! - The re-sort cadence of the pending queues

pub mod clock;
pub mod qos;
pub mod resort;

pub use clock::*;
pub use qos::*;
pub use resort::*;
