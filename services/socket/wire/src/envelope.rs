//! Envelope structures exchanged with the peer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved type tag for keepalive envelopes. Never valid as a caller type.
pub const HEARTBEAT_TYPE: &str = "socket-ping";

/// The `{type, data}` unit written to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type tag
    #[serde(rename = "type")]
    pub kind: String,
    /// Caller payload (absent for heartbeats)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Opaque instance tag for the peer's bookkeeping
    #[serde(
        rename = "instanceId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub instance_id: Option<String>,
    /// Explicit correlation id, only set in request-id correlation mode
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

impl Envelope {
    /// Create a request envelope carrying caller data
    pub fn request(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data: Some(data),
            instance_id: None,
            request_id: None,
        }
    }

    /// Create a heartbeat envelope. Heartbeats carry no caller data.
    pub fn heartbeat() -> Self {
        Self {
            kind: HEARTBEAT_TYPE.to_string(),
            data: None,
            instance_id: None,
            request_id: None,
        }
    }

    /// Attach the instance tag if one is configured
    pub fn with_instance_id(mut self, instance_id: Option<&str>) -> Self {
        self.instance_id = instance_id.map(str::to_string);
        self
    }

    /// Attach an explicit correlation id
    pub fn with_request_id(mut self, request_id: u64) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Whether this envelope uses the reserved heartbeat type
    pub fn is_heartbeat(&self) -> bool {
        self.kind == HEARTBEAT_TYPE
    }
}

/// Whether a caller-chosen type tag may be used for a request
pub fn is_valid_request_type(kind: &str) -> bool {
    !kind.is_empty() && kind != HEARTBEAT_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_shape() {
        let env = Envelope::request("test", json!({"blob": 1}));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({"type": "test", "data": {"blob": 1}}));
    }

    #[test]
    fn test_heartbeat_has_no_data() {
        let env = Envelope::heartbeat().with_instance_id(Some("worker-1"));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({"type": HEARTBEAT_TYPE, "instanceId": "worker-1"}));
        assert!(env.is_heartbeat());
    }

    #[test]
    fn test_request_id_serialized_camel_case() {
        let env = Envelope::request("get", Value::Null).with_request_id(7);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["requestId"], json!(7));
        assert_eq!(value["data"], Value::Null);
    }

    #[test]
    fn test_request_type_validation() {
        assert!(is_valid_request_type("test"));
        assert!(!is_valid_request_type(""));
        assert!(!is_valid_request_type(HEARTBEAT_TYPE));
    }
}
