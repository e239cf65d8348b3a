//! Core session management for a single peer.
//!
//! A [`SocketSession`] is a handle to a spawned task that owns the transport,
//! the heartbeat timer and the pending-request queue. Callers talk to the task
//! over a command channel, so every mutation of that state happens on one
//! logical thread and inbound messages are dispatched strictly in arrival order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, info_span, warn, Instrument};

use socket_wire::{
    decode_binary, decode_text, encode_envelope, is_valid_request_type, request_id_of, Envelope,
    WireError,
};

use crate::error::{SessionError, TransportError};
use crate::keepalive::{build_heartbeat, HeartbeatTimer};
use crate::listener::{CloseReason, SessionListener};
use crate::pending::{PendingQueue, Reply, ReplyResult};
use crate::transport::{Connector, Transport, TransportEvent, WsConnector};

/// How inbound messages are matched to pending requests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Every inbound message resolves the oldest pending request
    #[default]
    Fifo,
    /// Requests carry a `requestId`; only replies echoing it resolve them
    RequestId,
}

/// Configuration for a socket session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Target endpoint, e.g. `ws://localhost:8080/`
    pub address: String,
    /// Interval between heartbeat envelopes
    pub heartbeat_interval: Duration,
    /// Opaque tag forwarded in heartbeat envelopes
    pub instance_id: Option<String>,
    /// Reply matching strategy
    pub correlation: CorrelationMode,
    /// How long `stop()` waits for the peer to confirm the close
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: "ws://localhost:8080/".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            instance_id: None,
            correlation: CorrelationMode::Fifo,
            close_timeout: Duration::from_secs(1),
        }
    }
}

/// Connection lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening the transport
    Connecting,
    /// Connected; heartbeats running
    Open,
    /// Terminal
    Closed,
}

/// Statistics for a session
#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    /// Heartbeat envelopes written
    pub heartbeats_sent: u64,
    /// Request envelopes written
    pub requests_sent: u64,
    /// Well-formed inbound messages
    pub messages_received: u64,
    /// Inbound messages dropped because they could not be decoded
    pub malformed_dropped: u64,
    /// Pending requests resolved with a reply
    pub replies_resolved: u64,
    /// Requests rejected at teardown
    pub requests_rejected: u64,
    /// Timestamp of last inbound message
    pub last_message_in: Option<Instant>,
    /// Timestamp of last outbound envelope
    pub last_message_out: Option<Instant>,
}

/// Point-in-time view of a session
#[derive(Clone, Debug)]
pub struct SessionStatus {
    /// Lifecycle state
    pub state: ConnectionState,
    /// Requests awaiting a reply
    pub pending: usize,
    /// Whether the heartbeat timer is armed
    pub heartbeat_armed: bool,
    /// Traffic counters
    pub stats: SessionStats,
}

impl SessionStatus {
    fn connecting() -> Self {
        Self {
            state: ConnectionState::Connecting,
            pending: 0,
            heartbeat_armed: false,
            stats: SessionStats::default(),
        }
    }
}

/// Commands sent from handles to the session task
#[derive(Debug)]
enum Command {
    Send {
        kind: String,
        data: Value,
        tx: oneshot::Sender<ReplyResult>,
    },
    Stop,
}

/// A request issued before the connection opened
type BufferedSend = (String, Value, oneshot::Sender<ReplyResult>);

fn reject_buffered(buffered: &mut VecDeque<BufferedSend>, err: &SessionError) -> usize {
    let count = buffered.len();
    for (_, _, tx) in buffered.drain(..) {
        let _ = tx.send(Err(err.clone()));
    }
    count
}

/// Handle to a running session
#[derive(Debug)]
pub struct SocketSession {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl SocketSession {
    /// Connect to `config.address` over WebSocket and start the session.
    ///
    /// Returns immediately; the connection opens on a spawned task. Must be
    /// called from within a tokio runtime.
    pub fn start(config: SessionConfig, listeners: Vec<Arc<dyn SessionListener>>) -> Self {
        Self::start_with_connector(config, Arc::new(WsConnector), listeners)
    }

    /// Start a session over a custom transport
    pub fn start_with_connector(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        listeners: Vec<Arc<dyn SessionListener>>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus::connecting());

        let span = info_span!(
            "socket_session",
            address = %config.address,
            instance_id = ?config.instance_id
        );
        let task = SessionTask {
            config,
            listeners,
            pending: PendingQueue::new(),
            heartbeat: HeartbeatTimer::disarmed(),
            stats: SessionStats::default(),
            state: ConnectionState::Connecting,
            next_request_id: 1,
            status_tx,
        };
        tokio::spawn(task.run(connector, cmd_rx).instrument(span));

        Self { cmd_tx, status }
    }

    /// Send a request and return the handle settled by its reply.
    ///
    /// Never fails synchronously: every failure, including an invalid type or
    /// a session that already closed, is reported through the handle.
    pub fn send(&self, kind: impl Into<String>, data: Value) -> Reply {
        let kind = kind.into();
        if !is_valid_request_type(&kind) {
            return Reply::settled(Err(SessionError::InvalidType(kind)));
        }

        let (tx, reply) = Reply::channel();
        // On a closed channel the command is dropped with its sender, which
        // settles the handle with `SessionError::Closed`
        let _ = self.cmd_tx.send(Command::Send { kind, data, tx });
        reply
    }

    /// Stop the session. Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(Command::Stop);
    }

    /// Wait until the session has reached its terminal state and every
    /// listener has been notified
    pub async fn closed(&self) {
        let mut status = self.status.clone();
        // An error means the task is gone, which also means closed
        let _ = status
            .wait_for(|s| s.state == ConnectionState::Closed)
            .await;
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Snapshot of state, queue depth, timer and counters
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}

/// State owned by the session task
struct SessionTask {
    config: SessionConfig,
    listeners: Vec<Arc<dyn SessionListener>>,
    pending: PendingQueue,
    heartbeat: HeartbeatTimer,
    stats: SessionStats,
    state: ConnectionState,
    next_request_id: u64,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionTask {
    async fn run(mut self, connector: Arc<dyn Connector>, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let mut buffered = VecDeque::new();

        if self.config.heartbeat_interval.is_zero() {
            error!("Refusing to connect to {}: heartbeat interval is zero", self.config.address);
            let err = SessionError::ConnectFailed("heartbeat interval must be non-zero".into());
            self.fail_connect(&mut cmd_rx, buffered, err).await;
            return;
        }

        info!("Connecting to {}", self.config.address);

        // Requests issued while connecting wait here; a stop abandons the attempt
        let address = self.config.address.clone();
        let mut connect = connector.connect(&address);
        let connected = loop {
            tokio::select! {
                result = &mut connect => break Some(result),
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Send { kind, data, tx }) => buffered.push_back((kind, data, tx)),
                    Some(Command::Stop) | None => break None,
                },
            }
        };
        drop(connect);

        let mut transport = match connected {
            Some(Ok(transport)) => transport,
            Some(Err(e)) => {
                error!("Failed to connect to {}: {}", address, e);
                let err = SessionError::ConnectFailed(e.to_string());
                self.fail_connect(&mut cmd_rx, buffered, err).await;
                return;
            }
            None => {
                info!("Stopped before connection to {} opened", address);
                let rejected = reject_buffered(&mut buffered, &SessionError::Stopped);
                self.stats.requests_rejected += rejected as u64;
                self.reject_commands(&mut cmd_rx, &SessionError::Stopped).await;
                self.state = ConnectionState::Closed;
                self.publish();
                return;
            }
        };

        info!("Connection to {} open", address);
        self.state = ConnectionState::Open;
        for listener in &self.listeners {
            listener.on_open();
        }
        self.heartbeat.arm(self.config.heartbeat_interval);
        self.publish();

        let reason = match self.flush_buffered(transport.as_mut(), &mut buffered).await {
            Ok(()) => self.event_loop(transport.as_mut(), &mut cmd_rx).await,
            Err(reason) => {
                let rejected = reject_buffered(&mut buffered, &reason.rejection());
                self.stats.requests_rejected += rejected as u64;
                reason
            }
        };

        self.teardown(transport, &mut cmd_rx, reason).await;
    }

    /// Write the open heartbeat, then every request issued while connecting
    async fn flush_buffered(
        &mut self,
        transport: &mut dyn Transport,
        buffered: &mut VecDeque<BufferedSend>,
    ) -> Result<(), CloseReason> {
        // First tick is immediate
        self.heartbeat.tick().await;
        if let Err(e) = self.send_heartbeat(transport).await {
            error!("Failed to send heartbeat to {}: {}", self.config.address, e);
            return Err(CloseReason::TransportError(e.to_string()));
        }

        if !buffered.is_empty() {
            debug!("Flushing {} request(s) issued while connecting", buffered.len());
        }
        while let Some((kind, data, tx)) = buffered.pop_front() {
            if let Err(e) = self.send_request(transport, kind, data, tx).await {
                error!("Failed to send request to {}: {}", self.config.address, e);
                return Err(CloseReason::TransportError(e.to_string()));
            }
        }
        Ok(())
    }

    async fn event_loop(
        &mut self,
        transport: &mut dyn Transport,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    ) -> CloseReason {
        loop {
            tokio::select! {
                biased;

                _ = self.heartbeat.tick() => {
                    if let Err(e) = self.send_heartbeat(transport).await {
                        error!("Failed to send heartbeat to {}: {}", self.config.address, e);
                        return CloseReason::TransportError(e.to_string());
                    }
                }

                event = transport.next_event() => {
                    match event {
                        TransportEvent::Text(text) => self.dispatch(decode_text(&text)),
                        TransportEvent::Binary(payload) => self.dispatch(decode_binary(&payload)),
                        TransportEvent::Closed => {
                            info!("Peer {} closed the connection", self.config.address);
                            return CloseReason::RemoteClosed;
                        }
                        TransportEvent::Error(e) => {
                            error!("Transport error from {}: {}", self.config.address, e);
                            return CloseReason::TransportError(e);
                        }
                    }
                }

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Send { kind, data, tx }) => {
                            if let Err(e) = self.send_request(transport, kind, data, tx).await {
                                error!("Failed to send request to {}: {}", self.config.address, e);
                                return CloseReason::TransportError(e.to_string());
                            }
                        }
                        // All handles dropped counts as a stop
                        Some(Command::Stop) | None => return CloseReason::Stopped,
                    }
                }
            }
        }
    }

    /// Settle everything issued so far with `err` and report the failed open
    async fn fail_connect(
        &mut self,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
        mut buffered: VecDeque<BufferedSend>,
        err: SessionError,
    ) {
        let rejected = reject_buffered(&mut buffered, &err);
        self.stats.requests_rejected += rejected as u64;
        self.reject_commands(cmd_rx, &err).await;
        for listener in &self.listeners {
            listener.on_connect_failed(&err);
        }
        self.state = ConnectionState::Closed;
        self.publish();
    }

    async fn send_heartbeat(&mut self, transport: &mut dyn Transport) -> Result<(), TransportError> {
        let envelope = build_heartbeat(self.config.instance_id.as_deref());
        let text = encode_envelope(&envelope).map_err(|e| TransportError::Send(e.to_string()))?;
        transport.send_text(text).await?;

        self.stats.heartbeats_sent += 1;
        self.stats.last_message_out = Some(Instant::now());
        debug!("Sent heartbeat #{} to {}", self.stats.heartbeats_sent, self.config.address);
        self.publish();
        Ok(())
    }

    async fn send_request(
        &mut self,
        transport: &mut dyn Transport,
        kind: String,
        data: Value,
        tx: oneshot::Sender<ReplyResult>,
    ) -> Result<(), TransportError> {
        let request_id = match self.config.correlation {
            CorrelationMode::Fifo => None,
            CorrelationMode::RequestId => {
                let id = self.next_request_id;
                self.next_request_id += 1;
                Some(id)
            }
        };

        let mut envelope = Envelope::request(kind, data);
        if let Some(id) = request_id {
            envelope = envelope.with_request_id(id);
        }

        let text = match encode_envelope(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {:?} request: {}", envelope.kind, e);
                let _ = tx.send(Err(e.into()));
                return Ok(());
            }
        };

        // Enqueue before writing so a fast reply always finds its slot
        let seq = self.pending.push(tx, request_id);
        self.stats.requests_sent += 1;
        self.publish();

        transport.send_text(text).await?;
        self.stats.last_message_out = Some(Instant::now());
        debug!(
            "Sent {:?} request #{} to {} ({} pending)",
            envelope.kind,
            seq,
            self.config.address,
            self.pending.len()
        );
        Ok(())
    }

    /// Deliver one inbound message: listeners first, then the pending queue
    fn dispatch(&mut self, decoded: Result<Value, WireError>) {
        let payload = match decoded {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping malformed message from {}: {}", self.config.address, e);
                self.stats.malformed_dropped += 1;
                self.publish();
                return;
            }
        };

        self.stats.messages_received += 1;
        self.stats.last_message_in = Some(Instant::now());

        for listener in &self.listeners {
            listener.on_message(&payload);
        }

        let resolved = match self.config.correlation {
            CorrelationMode::Fifo => self.pending.resolve_oldest(payload),
            CorrelationMode::RequestId => match request_id_of(&payload) {
                Some(id) => self.pending.resolve_id(id, payload),
                None => None,
            },
        };

        match resolved {
            Some(seq) => {
                self.stats.replies_resolved += 1;
                debug!("Resolved request #{} ({} still pending)", seq, self.pending.len());
            }
            None => debug!("Inbound message matched no pending request"),
        }
        self.publish();
    }

    async fn teardown(
        &mut self,
        mut transport: Box<dyn Transport>,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
        reason: CloseReason,
    ) {
        self.heartbeat.disarm();

        let rejection = reason.rejection();
        let rejected = self.pending.reject_all(&rejection);
        if rejected > 0 {
            warn!("Rejected {} pending request(s): {}", rejected, rejection);
        }
        self.stats.requests_rejected += rejected as u64;
        self.publish();

        match tokio::time::timeout(self.config.close_timeout, transport.close()).await {
            Ok(Ok(())) => debug!("Transport to {} closed", self.config.address),
            Ok(Err(e)) => debug!("Closing transport to {} failed: {}", self.config.address, e),
            Err(_) => warn!(
                "Peer {} did not confirm close within {:?}",
                self.config.address, self.config.close_timeout
            ),
        }
        drop(transport);

        // Requests queued behind the stop never reached the transport
        self.reject_commands(cmd_rx, &rejection).await;

        info!(
            "Session with {} ended ({}). Stats: {:?}",
            self.config.address, reason, self.stats
        );
        for listener in &self.listeners {
            listener.on_close(&reason);
        }

        self.state = ConnectionState::Closed;
        self.publish();
    }

    /// Close the command channel and reject every request still buffered in it
    async fn reject_commands(
        &mut self,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
        err: &SessionError,
    ) {
        cmd_rx.close();
        while let Some(cmd) = cmd_rx.recv().await {
            if let Command::Send { tx, .. } = cmd {
                let _ = tx.send(Err(err.clone()));
                self.stats.requests_rejected += 1;
            }
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(SessionStatus {
            state: self.state,
            pending: self.pending.len(),
            heartbeat_armed: self.heartbeat.is_armed(),
            stats: self.stats.clone(),
        });
    }
}
