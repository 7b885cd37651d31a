//! Version envelope shared by every line

use cadence_core::{CadenceError, CadenceResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Current protocol version
pub const PROTOCOL_VERSION: u16 = 1;

/// Version field name
pub const VERSION_FIELD: &str = "v";

/// Maximum accepted line length, in bytes
pub const MAX_LINE_LEN: usize = 64 * 1024;

pub(crate) fn invalid(err: impl std::fmt::Display) -> CadenceError {
    CadenceError::InvalidWireFormat(err.to_string())
}

/// Serialize `body` (which must serialize to an object) and stamp the version
pub fn seal<T: Serialize>(body: &T) -> CadenceResult<String> {
    let mut value = serde_json::to_value(body).map_err(invalid)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| invalid("message body is not an object"))?;
    object.insert(VERSION_FIELD.to_string(), Value::from(PROTOCOL_VERSION));
    serde_json::to_string(&value).map_err(invalid)
}

/// Parse a line into its JSON object, rejecting other protocol versions
pub fn open(line: &str) -> CadenceResult<Map<String, Value>> {
    if line.len() > MAX_LINE_LEN {
        return Err(invalid(format!("line of {} bytes exceeds limit", line.len())));
    }

    let value: Value = serde_json::from_str(line.trim()).map_err(invalid)?;
    let Value::Object(mut object) = value else {
        return Err(invalid("message is not an object"));
    };

    let version = object
        .remove(VERSION_FIELD)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| invalid("missing protocol version"))?;
    if version != PROTOCOL_VERSION as u64 {
        return Err(CadenceError::UnsupportedVersion(
            u16::try_from(version).unwrap_or(u16::MAX),
        ));
    }

    Ok(object)
}

/// `open` then deserialize the body
pub fn open_as<T: DeserializeOwned>(line: &str) -> CadenceResult<T> {
    let object = open(line)?;
    serde_json::from_value(Value::Object(object)).map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_stamps_version() {
        let line = seal(&serde_json::json!({"type": "ping"})).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["v"], 1);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_open_rejects_bad_lines() {
        assert!(matches!(open("not json"), Err(CadenceError::InvalidWireFormat(_))));
        assert!(matches!(open("[1, 2]"), Err(CadenceError::InvalidWireFormat(_))));
        assert!(matches!(open(r#"{"type":"event"}"#), Err(CadenceError::InvalidWireFormat(_))));
        assert!(matches!(
            open(r#"{"v":2,"type":"event"}"#),
            Err(CadenceError::UnsupportedVersion(2))
        ));

        let long = format!(r#"{{"v":1,"pad":"{}"}}"#, "x".repeat(MAX_LINE_LEN));
        assert!(open(&long).is_err());
    }

    #[test]
    fn test_open_strips_version() {
        let object = open(" {\"v\":1,\"type\":\"event\"}\r").unwrap();
        assert!(!object.contains_key("v"));
        assert_eq!(object["type"], "event");
    }
}
