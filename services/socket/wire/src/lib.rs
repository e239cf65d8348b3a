//! Envelope format and JSON encoding/decoding for socket sessions.
//!
//! This crate provides the wire-level pieces shared by the session layer and
//! its hosts: the `{type, data}` envelope, the reserved heartbeat type and the
//! codec turning envelopes into transport frames and back.
//!
//! ## Wire Format
//!
//! ```text
//! { "type": "<tag>", "data": <payload>, "instanceId": "<opt>", "requestId": <opt> }
//! ```
//!
//! Heartbeats use the reserved `socket-ping` type and carry no `data`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod envelope;
pub mod error;

// Re-export main types
pub use codec::{decode_binary, decode_text, encode_envelope, request_id_of, REQUEST_ID_FIELD};
pub use envelope::{is_valid_request_type, Envelope, HEARTBEAT_TYPE};
pub use error::WireError;
