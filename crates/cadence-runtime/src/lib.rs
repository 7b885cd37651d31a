//! Cadence Runtime - the per-client processing engine
//!
//! Each client owns one `Engine`. Its processing loop runs as a Tokio task
//! while either intake queue is non-empty:
//! 1. Re-sort both pending queues every `buffer_time`
//! 2. Pick the candidate with the smaller timestamp (events win ties)
//! 3. Hold it until its admission gate opens
//! 4. Commit the event into history, or execute the request
//! 5. Publish the request's reply
//!
//! The loop exits when both queues drain and restarts on the next intake.

pub mod config;
pub mod control;
pub mod forecast;
pub mod engine;
mod command;

pub use config::*;
pub use control::*;
pub use forecast::*;
pub use engine::*;
