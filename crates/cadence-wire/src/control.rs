//! Actuator control lines
//!
//! One line per transient connection to an actuator's control endpoint:
//! `{"v":1,"type":"actuator_control","command":"set_state","value":true}` or
//! `{"v":1,"type":"actuator_control","command":"toggle"}`.

use cadence_core::{ActuatorCommand, CadenceResult};
use serde_json::Value;

use crate::{invalid, open, seal};

/// Message type of actuator control lines
pub const CONTROL_TYPE: &str = "actuator_control";

pub fn encode_actuator_control(command: &ActuatorCommand) -> CadenceResult<String> {
    let mut body = serde_json::to_value(command).map_err(invalid)?;
    let object = body
        .as_object_mut()
        .ok_or_else(|| invalid("actuator command is not an object"))?;
    object.insert("type".to_string(), Value::from(CONTROL_TYPE));
    seal(&body)
}

/// Decode a control line (actuator side)
pub fn decode_actuator_control(line: &str) -> CadenceResult<ActuatorCommand> {
    let mut object = open(line)?;
    match object.remove("type") {
        Some(Value::String(kind)) if kind == CONTROL_TYPE => {}
        _ => return Err(invalid("not an actuator control message")),
    }
    serde_json::from_value(Value::Object(object)).map_err(invalid)
}
