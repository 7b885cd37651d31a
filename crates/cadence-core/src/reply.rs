//! Results of executed requests

use serde::{Deserialize, Serialize};

use crate::{ActuatorCommand, ClientId, EntityId, Event, EventValue, RequestCommand};

/// What executing a command produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    MaxWaitTimeUpdated {
        seconds: f64,
    },
    /// The command was refused; engine state is unchanged
    Rejected {
        reason: String,
    },
    /// `sent` is `None` when the filter did not match or the actuator was not eligible
    Actuator {
        actuator: EntityId,
        sent: Option<ActuatorCommand>,
    },
    LogFilterInstalled,
    Events {
        events: Vec<Event>,
    },
    /// Ascending by id
    Entities {
        entity_ids: Vec<EntityId>,
    },
    MostActiveEntity {
        entity_id: Option<EntityId>,
    },
    /// Latest timestamp first
    Logs {
        entity_ids: Vec<EntityId>,
    },
    PredictedTimestamps {
        entity_id: EntityId,
        timestamps: Vec<f64>,
    },
    PredictedValues {
        entity_id: EntityId,
        values: Vec<EventValue>,
    },
}

/// Reply to one executed request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub client_id: ClientId,
    /// Timestamp of the request this answers
    pub request_timestamp: f64,
    pub command: RequestCommand,
    pub outcome: Outcome,
}
