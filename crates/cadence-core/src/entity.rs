//! Actuators: references carried by control requests, and the commands
//! sent to them

use serde::{Deserialize, Serialize};

use crate::{ClientId, EntityId};

/// Command sent to an actuator's control endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ActuatorCommand {
    SetState { value: bool },
    Toggle,
}

/// An actuator as advertised by its owner: who it belongs to and where it
/// accepts control commands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorRef {
    pub id: EntityId,
    pub client_id: ClientId,
    pub entity_type: String,
    /// Host of the actuator's control endpoint
    pub host: String,
    /// Port of the actuator's control endpoint
    pub control_port: u16,
    /// Whether the actuator has reported at least one event
    #[serde(default)]
    pub has_sent_event: bool,
}

impl ActuatorRef {
    pub fn new(
        id: EntityId,
        client_id: ClientId,
        entity_type: impl Into<String>,
        host: impl Into<String>,
        control_port: u16,
    ) -> Self {
        ActuatorRef {
            id,
            client_id,
            entity_type: entity_type.into(),
            host: host.into(),
            control_port,
            has_sent_event: false,
        }
    }

    pub fn with_sent_event(mut self, sent: bool) -> Self {
        self.has_sent_event = sent;
        self
    }

    /// `host:port` of the control endpoint
    pub fn control_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.control_port)
    }
}
