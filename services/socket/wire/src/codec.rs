//! JSON encoding and decoding for the wire protocol.
//!
//! Outbound traffic is always an [`Envelope`]. Inbound traffic is treated as an
//! opaque JSON value: the only validation is that it parses.

use crate::envelope::Envelope;
use crate::error::WireError;
use bytes::Bytes;
use serde_json::Value;

/// Field carrying the explicit correlation id on inbound replies
pub const REQUEST_ID_FIELD: &str = "requestId";

/// Serialize an envelope to the JSON text written on the transport
pub fn encode_envelope(envelope: &Envelope) -> Result<String, WireError> {
    serde_json::to_string(envelope).map_err(|e| WireError::Encode(e.to_string()))
}

/// Decode an inbound text frame
pub fn decode_text(text: &str) -> Result<Value, WireError> {
    if text.trim().is_empty() {
        return Err(WireError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Decode an inbound binary frame. Binary frames must hold UTF-8 JSON.
pub fn decode_binary(payload: &Bytes) -> Result<Value, WireError> {
    let text = std::str::from_utf8(payload).map_err(|_| WireError::Utf8)?;
    decode_text(text)
}

/// Extract the explicit correlation id from an inbound payload, if any
pub fn request_id_of(payload: &Value) -> Option<u64> {
    payload.get(REQUEST_ID_FIELD).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_request() {
        let text = encode_envelope(&Envelope::request("test", json!({"blob": 1}))).unwrap();
        assert_eq!(text, r#"{"type":"test","data":{"blob":1}}"#);
    }

    #[test]
    fn test_decode_text_accepts_any_json() {
        assert_eq!(
            decode_text(r#"{"response":"test"}"#).unwrap(),
            json!({"response": "test"})
        );
        assert_eq!(decode_text("42").unwrap(), json!(42));
        assert_eq!(decode_text("[1,2]").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode_text("{not json"), Err(WireError::Json(_))));
        assert!(matches!(decode_text("   "), Err(WireError::Empty)));
    }

    #[test]
    fn test_decode_binary() {
        let ok = Bytes::from_static(br#"{"a":true}"#);
        assert_eq!(decode_binary(&ok).unwrap(), json!({"a": true}));

        let bad = Bytes::from_static(&[0xff, 0xfe, 0x00]);
        assert!(matches!(decode_binary(&bad), Err(WireError::Utf8)));
    }

    #[test]
    fn test_request_id_of() {
        assert_eq!(request_id_of(&json!({"requestId": 3, "ok": 1})), Some(3));
        assert_eq!(request_id_of(&json!({"requestId": "3"})), None);
        assert_eq!(request_id_of(&json!([1])), None);
    }
}
