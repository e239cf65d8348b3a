//! Error types for socket sessions.

use socket_wire::WireError;
use std::fmt::Display;
use thiserror::Error;

/// Errors reported by a transport implementation
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connect to {address} failed: {reason}")]
    Connect {
        /// Target address
        address: String,
        /// Underlying failure
        reason: String,
    },

    /// Frame could not be written
    #[error("send failed: {0}")]
    Send(String),

    /// Closing handshake failed
    #[error("close failed: {0}")]
    Close(String),
}

/// Failure outcome handed to callers whose requests could not be answered.
///
/// The same value is cloned into every pending request when a session tears
/// down, so it carries strings rather than source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The connection never opened
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The transport reported an error after the connection opened
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The peer closed the connection
    #[error("connection closed by peer")]
    RemoteClosed,

    /// The session was stopped by its owner
    #[error("session stopped")]
    Stopped,

    /// The session had already terminated when the request was made
    #[error("session closed")]
    Closed,

    /// Empty or reserved type tag
    #[error("invalid message type: {0:?}")]
    InvalidType(String),

    /// Envelope could not be encoded
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<WireError> for SessionError {
    fn from(err: WireError) -> Self {
        SessionError::Encode(err.to_string())
    }
}

/// Caller misuse reported with human-readable messages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// A detailer type the client does not support
    #[error("You have passed a detailer type that may exist in PySyft, but is not currently supported in syft.js. Please file a feature request (https://github.com/OpenMined/syft.js/issues) for type {tag}, with value: {value}.")]
    UnsupportedDetailer {
        /// Detailer tag
        tag: String,
        /// Offending value, already rendered
        value: String,
    },

    /// Fewer arguments than the plan requires
    #[error("You have passed {passed} argument(s) when the plan requires {expected} argument(s).")]
    NotEnoughArgs {
        /// Number of arguments supplied
        passed: usize,
        /// Number of arguments required
        expected: usize,
    },

    /// An operation ran before its plan was loaded
    #[error("{}", NO_PLAN)]
    NoPlan,
}

/// Message for operations that require a plan that has not been loaded yet
pub const NO_PLAN: &str =
    "The operation you're attempting to run requires a plan before being called.";

/// Message for a detailer type that exists upstream but is not supported here
pub fn unsupported_detailer(tag: impl Display, value: impl Display) -> String {
    UsageError::UnsupportedDetailer {
        tag: tag.to_string(),
        value: value.to_string(),
    }
    .to_string()
}

/// Message for a plan invoked with too few arguments
pub fn not_enough_args(passed: usize, expected: usize) -> String {
    UsageError::NotEnoughArgs { passed, expected }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_detailer_message() {
        let msg = unsupported_detailer("torch.Size", "[1, 2]");
        assert!(msg.starts_with("You have passed a detailer type that may exist in PySyft"));
        assert!(msg.ends_with("for type torch.Size, with value: [1, 2]."));
    }

    #[test]
    fn test_not_enough_args_message() {
        assert_eq!(
            not_enough_args(1, 3),
            "You have passed 1 argument(s) when the plan requires 3 argument(s)."
        );
    }

    #[test]
    fn test_usage_error_display_matches_helpers() {
        let err = UsageError::NotEnoughArgs {
            passed: 0,
            expected: 2,
        };
        assert_eq!(err.to_string(), not_enough_args(0, 2));

        let err = UsageError::UnsupportedDetailer {
            tag: "17".into(),
            value: "x".into(),
        };
        assert_eq!(err.to_string(), unsupported_detailer(17, "x"));

        assert_eq!(UsageError::NoPlan.to_string(), NO_PLAN);
    }

    #[test]
    fn test_session_error_from_wire() {
        let err: SessionError = WireError::Utf8.into();
        assert!(matches!(err, SessionError::Encode(_)));
    }
}
