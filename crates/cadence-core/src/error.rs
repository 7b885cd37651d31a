//! Error types for cadence

use thiserror::Error;

use crate::ClientId;

/// Core cadence errors
#[derive(Error, Debug)]
pub enum CadenceError {
    // Configuration errors
    #[error("Max wait time can't be negative: {0}")]
    NegativeWaitTime(f64),

    #[error("Max wait time must be a finite number of seconds: {0}")]
    NonFiniteWaitTime(f64),

    #[error("Unknown filter field: {0}")]
    UnknownFilterField(String),

    #[error("Composite filter needs at least one member")]
    EmptyCompositeFilter,

    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    // Intake errors
    #[error("Arrival time already stamped")]
    ArrivalAlreadyStamped,

    #[error("Reception time already stamped")]
    ReceptionAlreadyStamped,

    #[error("Message for client {got} routed to engine of client {expected}")]
    ClientMismatch { expected: ClientId, got: ClientId },

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    // Runtime errors
    #[error("No async runtime available to run the engine")]
    RuntimeUnavailable,

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection failed")]
    ConnectionFailed,
}

/// Result type for cadence operations
pub type CadenceResult<T> = Result<T, CadenceError>;
