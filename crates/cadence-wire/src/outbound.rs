//! Outbound lines: replies and errors sent back to clients

use cadence_core::{CadenceResult, Reply};
use serde::{Deserialize, Serialize};

use crate::{open_as, seal};

/// One outbound line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Reply(Reply),
    /// An inbound line was dropped
    Error { message: String },
}

impl Outbound {
    pub fn error(message: impl Into<String>) -> Self {
        Outbound::Error {
            message: message.into(),
        }
    }
}

pub fn encode_outbound(message: &Outbound) -> CadenceResult<String> {
    seal(message)
}

/// Decode one outbound line (client side)
pub fn decode_outbound(line: &str) -> CadenceResult<Outbound> {
    open_as(line)
}
