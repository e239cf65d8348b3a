//! Transport abstraction and the WebSocket transport for socket sessions.
//!
//! A session only needs four things from the environment: open a connection,
//! write a text frame, receive the next event and close. [`Connector`] and
//! [`Transport`] capture exactly that so tests can substitute an in-memory peer.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Events delivered by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
    /// The peer closed the connection or the stream ended
    Closed,
    /// The transport failed
    Error(String),
}

/// An open, message-oriented connection to the peer
#[async_trait]
pub trait Transport: Send {
    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next event.
    ///
    /// Must be cancel-safe: the session races it against its timer and command
    /// channel, and a cancelled call must not lose a frame.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the connection and wait for the peer to confirm
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports to a target address
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// WebSocket connector backed by `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, response) =
            connect_async(address)
                .await
                .map_err(|e| TransportError::Connect {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;
        debug!("WebSocket handshake with {} completed ({})", address, response.status());
        Ok(Box::new(WsTransport::new(stream)))
    }
}

/// WebSocket transport
pub struct WsTransport {
    stream: WsStream,
}

impl WsTransport {
    /// Wrap an already-open WebSocket stream
    pub fn new(stream: WsStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text.as_str().to_string()),
                Some(Ok(Message::Binary(payload))) => return TransportEvent::Binary(payload),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Received close frame: {:?}", frame);
                    return TransportEvent::Closed;
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return TransportEvent::Closed
                }
                Some(Err(e)) => return TransportEvent::Error(e.to_string()),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
            Err(e) => return Err(TransportError::Close(e.to_string())),
        }

        // Drain until the peer echoes the close frame and the stream ends
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Close(_)) => debug!("Peer confirmed close"),
                Ok(_) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
                Err(e) => return Err(TransportError::Close(e.to_string())),
            }
        }
        Ok(())
    }
}
