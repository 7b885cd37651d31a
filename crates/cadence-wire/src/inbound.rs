//! Inbound lines: events and requests from clients

use cadence_core::{
    CadenceResult, ClientId, Command, EntityId, Event, EventValue, Request, RequestCommand,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{invalid, open, seal};

/// Event as sent by a producer. Carries no arrival time; that is stamped
/// by the receiving engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: f64,
    pub client_id: ClientId,
    pub entity_id: EntityId,
    pub entity_type: String,
    pub value: EventValue,
}

impl EventRecord {
    pub fn from_event(event: &Event) -> Self {
        EventRecord {
            timestamp: event.timestamp(),
            client_id: event.client_id(),
            entity_id: event.entity_id(),
            entity_type: event.entity_type().to_string(),
            value: event.value(),
        }
    }

    pub fn into_event(self) -> Event {
        Event::new(
            self.timestamp,
            self.client_id,
            self.entity_id,
            self.entity_type,
            self.value,
        )
    }
}

/// Request as sent by a client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub timestamp: f64,
    pub client_id: ClientId,
    #[serde(default)]
    pub email: String,
    pub command: Command,
}

impl RequestRecord {
    pub fn from_request(request: &Request) -> Self {
        RequestRecord {
            timestamp: request.timestamp(),
            client_id: request.client_id(),
            email: request.email().to_string(),
            command: request.command().clone(),
        }
    }

    pub fn into_request(self) -> Request {
        Request::new(self.timestamp, self.client_id, self.email, self.command)
    }
}

/// One inbound line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Event(EventRecord),
    Request(RequestRecord),
}

impl Inbound {
    /// Client whose engine this message belongs to
    pub fn client_id(&self) -> ClientId {
        match self {
            Inbound::Event(record) => record.client_id,
            Inbound::Request(record) => record.client_id,
        }
    }
}

/// Decode one inbound line
pub fn decode_inbound(line: &str) -> CadenceResult<Inbound> {
    let object = open(line)?;

    // Name unknown commands explicitly rather than as a generic schema error
    if let Some(kind) = object
        .get("command")
        .and_then(|command| command.get("kind"))
        .and_then(Value::as_str)
    {
        kind.parse::<RequestCommand>()?;
    }

    serde_json::from_value(Value::Object(object)).map_err(invalid)
}

/// Encode one inbound line (client side)
pub fn encode_inbound(message: &Inbound) -> CadenceResult<String> {
    seal(message)
}
