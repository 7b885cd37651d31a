//! Event definitions
//!
//! An event is one measurement (sensor) or actuation (actuator) reported by an
//! entity. Everything except the server-assigned arrival time is fixed at
//! construction.

use serde::{Deserialize, Serialize};

use crate::{CadenceError, CadenceResult, ClientId, EntityId, ServerTime};

/// Value returned by `value_double` for boolean-valued events
pub const DOUBLE_SENTINEL: f64 = -1.0;

/// Value returned by `value_bool` for numeric events
pub const BOOL_SENTINEL: bool = false;

/// Event payload - exactly one kind is meaningful per event
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventValue {
    Double(f64),
    Bool(bool),
}

impl EventValue {
    pub fn kind(&self) -> EntityKind {
        match self {
            EventValue::Double(_) => EntityKind::Sensor,
            EventValue::Bool(_) => EntityKind::Actuator,
        }
    }
}

/// Kind of entity that produced an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    Actuator,
}

/// Event - a timestamped measurement or actuation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    timestamp: f64,
    client_id: ClientId,
    entity_id: EntityId,
    entity_type: String,
    value: EventValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arrival_time: Option<ServerTime>,
}

impl Event {
    /// Create a new event, not yet stamped with an arrival time
    pub fn new(
        timestamp: f64,
        client_id: ClientId,
        entity_id: EntityId,
        entity_type: impl Into<String>,
        value: EventValue,
    ) -> Self {
        Event {
            timestamp,
            client_id,
            entity_id,
            entity_type: entity_type.into(),
            value,
            arrival_time: None,
        }
    }

    /// Sensor reading
    pub fn sensor(
        timestamp: f64,
        client_id: ClientId,
        entity_id: EntityId,
        entity_type: impl Into<String>,
        value: f64,
    ) -> Self {
        Self::new(timestamp, client_id, entity_id, entity_type, EventValue::Double(value))
    }

    /// Actuator state report
    pub fn actuator(
        timestamp: f64,
        client_id: ClientId,
        entity_id: EntityId,
        entity_type: impl Into<String>,
        value: bool,
    ) -> Self {
        Self::new(timestamp, client_id, entity_id, entity_type, EventValue::Bool(value))
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[inline]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    #[inline]
    pub fn value(&self) -> EventValue {
        self.value
    }

    pub fn kind(&self) -> EntityKind {
        self.value.kind()
    }

    /// Numeric value, or `DOUBLE_SENTINEL` for an actuator event
    #[inline]
    pub fn value_double(&self) -> f64 {
        match self.value {
            EventValue::Double(v) => v,
            EventValue::Bool(_) => DOUBLE_SENTINEL,
        }
    }

    /// Boolean value, or `BOOL_SENTINEL` for a sensor event
    #[inline]
    pub fn value_bool(&self) -> bool {
        match self.value {
            EventValue::Bool(v) => v,
            EventValue::Double(_) => BOOL_SENTINEL,
        }
    }

    #[inline]
    pub fn arrival_time(&self) -> Option<ServerTime> {
        self.arrival_time
    }

    /// Stamp the arrival time. Can only happen once.
    pub fn stamp_arrival(&mut self, at: ServerTime) -> CadenceResult<()> {
        if self.arrival_time.is_some() {
            return Err(CadenceError::ArrivalAlreadyStamped);
        }
        self.arrival_time = Some(at);
        Ok(())
    }
}
