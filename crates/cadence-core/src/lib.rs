//! Cadence Core - Fundamental types shared by every crate
//!
//! This crate defines:
//! - Identifiers (ClientId, EntityId)
//! - Server time and time windows
//! - Events and requests, with their server-assigned intake stamps
//! - The filter language used for logging and actuator control
//! - Replies produced by executed requests
//! - The error type shared across the workspace

pub mod id;
pub mod time;
pub mod event;
pub mod entity;
pub mod filter;
pub mod request;
pub mod reply;
pub mod error;

pub use id::*;
pub use time::*;
pub use event::*;
pub use entity::*;
pub use filter::*;
pub use request::*;
pub use reply::*;
pub use error::*;
