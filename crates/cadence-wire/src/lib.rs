//! Cadence Wire Protocol - JSON lines
//!
//! Every message is one JSON object on one line, carrying:
//! - `"v"`: the protocol version, checked on decode
//! - `"type"`: the message kind
//! - the message body, flattened next to the two fields above
//!
//! Inbound lines carry events and requests; outbound lines carry replies
//! and errors; actuator control lines go to actuator endpoints.

pub mod envelope;
pub mod inbound;
pub mod outbound;
pub mod control;

pub use envelope::*;
pub use inbound::*;
pub use outbound::*;
pub use control::*;
