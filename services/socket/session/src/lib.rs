//! Single-peer WebSocket session with heartbeats and request/response correlation.
//!
//! This crate keeps one persistent connection to a remote peer alive, lets
//! callers issue requests and await the matching reply without handling
//! framing or timers, and reports connection lifecycle events to the host.
//!
//! ## Features
//!
//! - **Heartbeats**: a reserved-type envelope right after open and then on a
//!   fixed interval
//! - **Correlation**: replies matched to requests in arrival order, or by an
//!   explicit `requestId`
//! - **Failure propagation**: every pending request is rejected when the
//!   connection breaks or the session is stopped
//! - **Listeners**: closure hooks or an event channel for open/close/message
//!
//! ## Example
//!
//! ```rust,no_run
//! use socket_session::{EventChannel, SessionConfig, SessionEvent, SessionListener, SocketSession};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SessionConfig {
//!     address: "ws://127.0.0.1:8080/".to_string(),
//!     heartbeat_interval: Duration::from_secs(10),
//!     instance_id: Some("worker-1".to_string()),
//!     ..Default::default()
//! };
//!
//! let (listener, mut events) = EventChannel::new();
//! let listener: Arc<dyn SessionListener> = Arc::new(listener);
//! let session = SocketSession::start(config, vec![listener]);
//!
//! let reply = session.send("get-plan", json!({"id": 7})).await?;
//! println!("Reply: {}", reply);
//!
//! session.stop();
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Closed { reason } = event {
//!         println!("Session closed: {}", reason);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod keepalive;
pub mod listener;
pub mod pending;
pub mod session;
pub mod transport;

// Re-export main types
pub use error::{
    not_enough_args, unsupported_detailer, SessionError, TransportError, UsageError, NO_PLAN,
};
pub use keepalive::{build_heartbeat, HeartbeatTimer};
pub use listener::{CloseReason, EventChannel, Hooks, SessionEvent, SessionListener};
pub use pending::{PendingQueue, Reply, ReplyResult};
pub use session::{
    ConnectionState, CorrelationMode, SessionConfig, SessionStats, SessionStatus, SocketSession,
};
pub use transport::{Connector, Transport, TransportEvent, WsConnector, WsTransport};
