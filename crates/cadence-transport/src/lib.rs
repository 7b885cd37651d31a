//! Cadence Transport - network boundary of the engines
//!
//! This crate implements:
//! - The router: one engine per client, created on first contact
//! - TCP ingress: JSON lines in, replies and errors out
//! - TCP actuator control: one transient connection per command

pub mod router;
pub mod ingress;
pub mod control;

pub use router::*;
pub use ingress::*;
pub use control::*;
