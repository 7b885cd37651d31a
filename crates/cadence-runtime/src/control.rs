//! Actuator control bridge
//!
//! The engine decides *whether* an actuator is commanded; an
//! `ActuatorControl` implementation decides *how* the command reaches the
//! actuator's endpoint.

use cadence_core::{ActuatorCommand, ActuatorRef};

/// Sends control commands to actuator endpoints.
///
/// Delivery is fire-and-forget: implementations log and swallow failures
/// and must not block the caller on I/O.
pub trait ActuatorControl: Send + Sync {
    fn send(&self, actuator: &ActuatorRef, command: ActuatorCommand);
}
