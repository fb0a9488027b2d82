//! Channel transport: the seam between the session actor and the wire.
//!
//! The actor only ever sees the [`Transport`] and [`Connector`] traits;
//! tests drive sessions with scripted in-process transports, production uses
//! the WebSocket implementation below.

use async_trait::async_trait;
use flymap_core::ConnectionError;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Close reason used for intentional leaves; a session seeing it will not
/// attempt to reconnect.
pub const LEAVE_REASON: &str = "leave";

/// A joined channel carrying text frames.
#[async_trait]
pub trait Transport: Send {
    /// Sends one frame.
    async fn send(&mut self, frame: String) -> Result<(), ConnectionError>;

    /// Next inbound frame. `None` means the stream ended without a close
    /// frame; an `Err` carries the close or transport failure.
    async fn next_frame(&mut self) -> Option<Result<String, ConnectionError>>;

    /// Leaves the channel gracefully.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Establishes a fresh [`Transport`] per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, topic: &str) -> Result<Box<dyn Transport>, ConnectionError>;
}

/// WebSocket connector for live map endpoints.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    /// Endpoint URL (ws:// or wss://)
    pub endpoint: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, topic: &str) -> Result<Box<dyn Transport>, ConnectionError> {
        let url = format!("{}?topic={}", self.endpoint, topic);
        info!(%url, "Joining map channel");

        let (stream, response) = timeout(self.connect_timeout, connect_async(&url))
            .await
            .map_err(|_| ConnectionError::join_failed(topic, "connection timeout"))?
            .map_err(|e| ConnectionError::join_failed(topic, e.to_string()))?;

        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// [`Transport`] over a tungstenite WebSocket stream.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), ConnectionError> {
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| ConnectionError::transport(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        warn!("Dropping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = self.stream.send(Message::Pong(payload)).await {
                        return Some(Err(ConnectionError::transport(e.to_string())));
                    }
                }
                Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "closed by remote".to_string());
                    return Some(Err(ConnectionError::closed(reason)));
                }
                Ok(Message::Frame(_)) => {
                    warn!("Received unexpected raw frame");
                }
                Err(e) => return Some(Err(ConnectionError::transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.stream
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: LEAVE_REASON.into(),
            }))
            .await
            .map_err(|e| ConnectionError::transport(e.to_string()))
    }
}
