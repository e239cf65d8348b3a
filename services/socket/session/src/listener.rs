//! Lifecycle listeners for socket sessions.
//!
//! A session notifies every registered [`SessionListener`]. [`Hooks`] covers
//! the common single-callback case and [`EventChannel`] forwards events to a
//! channel for subsystems that prefer to consume them as a stream.

use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Why a session reached its terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The owner called `stop()`
    Stopped,
    /// The peer closed the connection
    RemoteClosed,
    /// The transport failed
    TransportError(String),
}

impl CloseReason {
    /// Failure handed to requests still pending at teardown
    pub fn rejection(&self) -> SessionError {
        match self {
            CloseReason::Stopped => SessionError::Stopped,
            CloseReason::RemoteClosed => SessionError::RemoteClosed,
            CloseReason::TransportError(reason) => SessionError::ConnectionLost(reason.clone()),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Stopped => write!(f, "stopped"),
            CloseReason::RemoteClosed => write!(f, "closed by peer"),
            CloseReason::TransportError(reason) => write!(f, "transport error: {}", reason),
        }
    }
}

/// Observer of session lifecycle and traffic. All methods default to no-ops.
///
/// Listeners run on the session task, so they should return quickly.
pub trait SessionListener: Send + Sync {
    /// The connection opened. Called at most once per session.
    fn on_open(&self) {}

    /// The session reached its terminal state. Only called after `on_open`.
    fn on_close(&self, _reason: &CloseReason) {}

    /// A well-formed message arrived, before it is matched to a pending request
    fn on_message(&self, _payload: &Value) {}

    /// The connection could not be opened
    fn on_connect_failed(&self, _error: &SessionError) {}
}

type OpenHook = Box<dyn Fn() + Send + Sync>;
type CloseHook = Box<dyn Fn(&CloseReason) + Send + Sync>;
type MessageHook = Box<dyn Fn(&Value) + Send + Sync>;

/// Closure-based listener with one optional slot per event
#[derive(Default)]
pub struct Hooks {
    on_open: Option<OpenHook>,
    on_close: Option<CloseHook>,
    on_message: Option<MessageHook>,
}

impl Hooks {
    /// Hooks with every slot empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the "opened" hook
    pub fn with_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    /// Set the "closed" hook
    pub fn with_close(mut self, hook: impl Fn(&CloseReason) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Set the "message received" hook
    pub fn with_message(mut self, hook: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

impl SessionListener for Hooks {
    fn on_open(&self) {
        if let Some(hook) = &self.on_open {
            hook();
        }
    }

    fn on_close(&self, reason: &CloseReason) {
        if let Some(hook) = &self.on_close {
            hook(reason);
        }
    }

    fn on_message(&self, payload: &Value) {
        if let Some(hook) = &self.on_message {
            hook(payload);
        }
    }
}

/// Events emitted by sessions
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection opened
    Opened,
    /// The session terminated
    Closed {
        /// Why it terminated
        reason: CloseReason,
    },
    /// A message arrived
    Message {
        /// Decoded payload
        payload: Value,
    },
    /// The connection could not be opened
    ConnectFailed {
        /// Failure reported to buffered requests
        error: SessionError,
    },
}

/// Listener forwarding every event into an unbounded channel
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventChannel {
    /// Create the listener and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: SessionEvent) {
        // Receiver gone means nobody is interested any more
        let _ = self.tx.send(event);
    }
}

impl SessionListener for EventChannel {
    fn on_open(&self) {
        self.emit(SessionEvent::Opened);
    }

    fn on_close(&self, reason: &CloseReason) {
        self.emit(SessionEvent::Closed {
            reason: reason.clone(),
        });
    }

    fn on_message(&self, payload: &Value) {
        self.emit(SessionEvent::Message {
            payload: payload.clone(),
        });
    }

    fn on_connect_failed(&self, error: &SessionError) {
        self.emit(SessionEvent::ConnectFailed {
            error: error.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_hooks_are_noops() {
        let hooks = Hooks::new();
        hooks.on_open();
        hooks.on_message(&json!(1));
        hooks.on_close(&CloseReason::Stopped);
        hooks.on_connect_failed(&SessionError::Closed);
    }

    #[test]
    fn test_hooks_invoke_closures() {
        let opened = Arc::new(AtomicUsize::new(0));
        let messages = Arc::new(AtomicUsize::new(0));
        let hooks = Hooks::new()
            .with_open({
                let opened = opened.clone();
                move || {
                    opened.fetch_add(1, Ordering::SeqCst);
                }
            })
            .with_message({
                let messages = messages.clone();
                move |_| {
                    messages.fetch_add(1, Ordering::SeqCst);
                }
            });

        hooks.on_open();
        hooks.on_message(&json!({"a": 1}));
        hooks.on_message(&json!({"a": 2}));

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(messages.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_event_channel_forwards_in_order() {
        let (listener, mut rx) = EventChannel::new();
        listener.on_open();
        listener.on_message(&json!("hi"));
        listener.on_close(&CloseReason::RemoteClosed);

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Opened);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Message {
                payload: json!("hi")
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Closed {
                reason: CloseReason::RemoteClosed
            }
        );
    }

    #[test]
    fn test_close_reason_rejection() {
        assert_eq!(CloseReason::Stopped.rejection(), SessionError::Stopped);
        assert_eq!(
            CloseReason::TransportError("eof".into()).rejection(),
            SessionError::ConnectionLost("eof".into())
        );
    }
}
