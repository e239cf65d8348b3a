//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Payload is not well-formed JSON
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary frame is not valid UTF-8
    #[error("binary frame is not utf-8")]
    Utf8,

    /// Envelope could not be serialized
    #[error("envelope encode failed: {0}")]
    Encode(String),

    /// Payload is empty
    #[error("empty payload")]
    Empty,
}
