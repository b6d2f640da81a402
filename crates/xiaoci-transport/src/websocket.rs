//! WebSocket inbound link (forward WebSocket to the gateway).

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};

use xiaoci_core::{TransportError, TransportResult};

use crate::supervisor::{Connector, FrameSource};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections to a fixed URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    access_token: Option<String>,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
        }
    }

    /// Sends `Authorization: Bearer <token>` on the handshake.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> TransportResult<Box<dyn FrameSource>> {
        let mut request = self.url.as_str().into_client_request().map_err(|e| {
            TransportError::InvalidConfig(format!("invalid WebSocket URL {}: {e}", self.url))
        })?;

        if let Some(token) = &self.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                TransportError::InvalidConfig(format!("invalid access token: {e}"))
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        info!(url = %self.url, "Connecting to WebSocket server");
        let (stream, response) =
            connect_async(request)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: self.url.clone(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;
        debug!(url = %self.url, status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WsFrameSource { stream }))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// Reads text frames from an open WebSocket.
///
/// Control frames are consumed here; tungstenite queues the pong for
/// every ping it reads.
pub struct WsFrameSource {
    stream: WsStream,
}

/// What one WebSocket message means to the supervisor.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Frame(String),
    Skip,
    Closed,
}

fn inbound(message: Message) -> Inbound {
    match message {
        Message::Text(text) => {
            trace!(len = text.len(), "Received text frame");
            Inbound::Frame(text.as_str().to_owned())
        }
        Message::Binary(data) => {
            trace!(len = data.len(), "Received binary frame");
            Inbound::Frame(String::from_utf8_lossy(&data).into_owned())
        }
        Message::Ping(data) => {
            trace!(len = data.len(), "Received ping");
            Inbound::Skip
        }
        Message::Pong(_) => {
            trace!("Received pong");
            Inbound::Skip
        }
        Message::Frame(_) => Inbound::Skip,
        Message::Close(frame) => {
            info!(frame = ?frame, "Server closed connection");
            Inbound::Closed
        }
    }
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> TransportResult<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => match inbound(message) {
                    Inbound::Frame(text) => return Ok(Some(text)),
                    Inbound::Skip => {}
                    Inbound::Closed => return Ok(None),
                },
                Some(Err(e)) => {
                    return Err(TransportError::ConnectionClosed {
                        reason: e.to_string(),
                    });
                }
                None => {
                    info!("WebSocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}
