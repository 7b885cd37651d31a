//! Requests and the commands they carry
//!
//! A request is a client's instruction to its engine. The engine only sees
//! the decoded command with typed arguments; how a command travels on the
//! wire is owned by `cadence-wire`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    ActuatorRef, CadenceError, CadenceResult, ClientId, EntityId, Filter, ServerTime, TimeWindow,
};

/// Request category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Config,
    Control,
    Analysis,
    Predict,
}

/// Command name, without arguments
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestCommand {
    ConfigUpdateMaxWaitTime,
    ControlSetActuatorState,
    ControlToggleActuatorState,
    ControlNotifyIf,
    AnalysisGetEventsInWindow,
    AnalysisGetAllEntities,
    AnalysisGetLatestEvents,
    AnalysisGetMostActiveEntity,
    AnalysisReadLogs,
    PredictNextNTimestamps,
    PredictNextNValues,
}

impl RequestCommand {
    pub const ALL: [RequestCommand; 11] = [
        RequestCommand::ConfigUpdateMaxWaitTime,
        RequestCommand::ControlSetActuatorState,
        RequestCommand::ControlToggleActuatorState,
        RequestCommand::ControlNotifyIf,
        RequestCommand::AnalysisGetEventsInWindow,
        RequestCommand::AnalysisGetAllEntities,
        RequestCommand::AnalysisGetLatestEvents,
        RequestCommand::AnalysisGetMostActiveEntity,
        RequestCommand::AnalysisReadLogs,
        RequestCommand::PredictNextNTimestamps,
        RequestCommand::PredictNextNValues,
    ];

    pub fn request_type(self) -> RequestType {
        match self {
            RequestCommand::ConfigUpdateMaxWaitTime => RequestType::Config,
            RequestCommand::ControlSetActuatorState
            | RequestCommand::ControlToggleActuatorState
            | RequestCommand::ControlNotifyIf => RequestType::Control,
            RequestCommand::AnalysisGetEventsInWindow
            | RequestCommand::AnalysisGetAllEntities
            | RequestCommand::AnalysisGetLatestEvents
            | RequestCommand::AnalysisGetMostActiveEntity
            | RequestCommand::AnalysisReadLogs => RequestType::Analysis,
            RequestCommand::PredictNextNTimestamps | RequestCommand::PredictNextNValues => {
                RequestType::Predict
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestCommand::ConfigUpdateMaxWaitTime => "CONFIG_UPDATE_MAX_WAIT_TIME",
            RequestCommand::ControlSetActuatorState => "CONTROL_SET_ACTUATOR_STATE",
            RequestCommand::ControlToggleActuatorState => "CONTROL_TOGGLE_ACTUATOR_STATE",
            RequestCommand::ControlNotifyIf => "CONTROL_NOTIFY_IF",
            RequestCommand::AnalysisGetEventsInWindow => "ANALYSIS_GET_EVENTS_IN_WINDOW",
            RequestCommand::AnalysisGetAllEntities => "ANALYSIS_GET_ALL_ENTITIES",
            RequestCommand::AnalysisGetLatestEvents => "ANALYSIS_GET_LATEST_EVENTS",
            RequestCommand::AnalysisGetMostActiveEntity => "ANALYSIS_GET_MOST_ACTIVE_ENTITY",
            RequestCommand::AnalysisReadLogs => "ANALYSIS_READ_LOGS",
            RequestCommand::PredictNextNTimestamps => "PREDICT_NEXT_N_TIMESTAMPS",
            RequestCommand::PredictNextNValues => "PREDICT_NEXT_N_VALUES",
        }
    }
}

impl fmt::Display for RequestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestCommand {
    type Err = CadenceError;

    fn from_str(s: &str) -> CadenceResult<Self> {
        RequestCommand::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| CadenceError::UnknownCommand(s.to_string()))
    }
}

/// Command with typed arguments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    ConfigUpdateMaxWaitTime { seconds: f64 },
    ControlSetActuatorState { filter: Filter, actuator: ActuatorRef },
    ControlToggleActuatorState { filter: Filter, actuator: ActuatorRef },
    ControlNotifyIf { filter: Filter },
    AnalysisGetEventsInWindow { window: TimeWindow },
    AnalysisGetAllEntities,
    AnalysisGetLatestEvents { n: usize },
    AnalysisGetMostActiveEntity,
    AnalysisReadLogs,
    PredictNextNTimestamps { entity_id: EntityId, n: usize },
    PredictNextNValues { entity_id: EntityId, n: usize },
}

impl Command {
    pub fn name(&self) -> RequestCommand {
        match self {
            Command::ConfigUpdateMaxWaitTime { .. } => RequestCommand::ConfigUpdateMaxWaitTime,
            Command::ControlSetActuatorState { .. } => RequestCommand::ControlSetActuatorState,
            Command::ControlToggleActuatorState { .. } => {
                RequestCommand::ControlToggleActuatorState
            }
            Command::ControlNotifyIf { .. } => RequestCommand::ControlNotifyIf,
            Command::AnalysisGetEventsInWindow { .. } => RequestCommand::AnalysisGetEventsInWindow,
            Command::AnalysisGetAllEntities => RequestCommand::AnalysisGetAllEntities,
            Command::AnalysisGetLatestEvents { .. } => RequestCommand::AnalysisGetLatestEvents,
            Command::AnalysisGetMostActiveEntity => RequestCommand::AnalysisGetMostActiveEntity,
            Command::AnalysisReadLogs => RequestCommand::AnalysisReadLogs,
            Command::PredictNextNTimestamps { .. } => RequestCommand::PredictNextNTimestamps,
            Command::PredictNextNValues { .. } => RequestCommand::PredictNextNValues,
        }
    }
}

/// Request - a command from a client, queued by its engine
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    timestamp: f64,
    client_id: ClientId,
    email: String,
    command: Command,
    reception_time: Option<ServerTime>,
}

impl Request {
    pub fn new(
        timestamp: f64,
        client_id: ClientId,
        email: impl Into<String>,
        command: Command,
    ) -> Self {
        Request {
            timestamp,
            client_id,
            email: email.into(),
            command,
            reception_time: None,
        }
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[inline]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn into_command(self) -> Command {
        self.command
    }

    pub fn request_command(&self) -> RequestCommand {
        self.command.name()
    }

    pub fn request_type(&self) -> RequestType {
        self.command.name().request_type()
    }

    #[inline]
    pub fn reception_time(&self) -> Option<ServerTime> {
        self.reception_time
    }

    /// Stamp the reception time. Can only happen once.
    pub fn stamp_reception(&mut self, at: ServerTime) -> CadenceResult<()> {
        if self.reception_time.is_some() {
            return Err(CadenceError::ReceptionAlreadyStamped);
        }
        self.reception_time = Some(at);
        Ok(())
    }
}
