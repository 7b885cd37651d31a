//! Cadence State - the committed history of one client
//!
//! This crate implements:
//! - Timestamp-ordered history with out-of-order commit
//! - The active filter and its log buffer, repaired on out-of-order commit
//! - Read-only analytics over the history

pub mod history;
pub mod analytics;

pub use history::*;
