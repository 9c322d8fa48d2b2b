//! WebSocket transport using `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] opens a [`WebSocketTransport`] to the match server
//! on every `connect()`. Both `ws://` and `wss://` URLs work.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), familimatch_room::RoomError> {
//! use familimatch_room::transport::Transport;
//! use familimatch_room::WebSocketTransport;
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:8030/ws/match").await?;
//! transport
//!     .send(r#"{"type":"ready","data":{}}"#.to_string())
//!     .await?;
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::error::RoomError;
use crate::transport::{Connector, Transport};

/// The underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] over one WebSocket connection.
///
/// [`recv`](Transport::recv) is cancel-safe: it only awaits the stream's
/// `next()`, which does not lose frames when dropped.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Io`], preserving the I/O error kind when the
    /// handshake failed at the socket level.
    pub async fn connect(url: &str) -> Result<Self, RoomError> {
        debug!(url = %url, "opening match server socket");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            RoomError::Io(std::io::Error::new(kind, e))
        })?;

        info!(url = %url, "match server socket open");
        Ok(Self::from_stream(stream))
    }

    /// Like [`connect`](Self::connect) but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Timeout`] if the deadline elapses first.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, RoomError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| RoomError::Timeout)?
    }

    /// Wrap an already-established stream (custom TLS, proxies, headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), RoomError> {
        if self.closed {
            return Err(RoomError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| RoomError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, RoomError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(RoomError::TransportReceive(e.to_string()))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    debug!(?frame, "match server sent close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(bytes) => {
                    warn!(len = bytes.len(), "skipping binary frame");
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), RoomError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| RoomError::TransportSend(e.to_string()))
    }
}

/// Opens a new [`WebSocketTransport`] to a fixed URL for each connection.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector for `url` that gives up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    /// The server URL this connector dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self) -> Result<WebSocketTransport, RoomError> {
        WebSocketTransport::connect_with_timeout(&self.url, self.timeout).await
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one WebSocket connection on a local port and hand it to `handler`.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/ws/match")
    }

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Io(_)));
    }

    #[tokio::test]
    async fn connector_times_out_on_unroutable_host() {
        let connector = WebSocketConnector::new("ws://192.0.2.1:1", Duration::from_millis(50));
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, RoomError::Timeout));
    }

    #[tokio::test]
    async fn recv_yields_room_frames_in_order() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(
                r#"{"type":"room_created","data":{"room_code":"5678","player_id":"p_1"}}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(r#"{"type":"consent_required","data":{}}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(url, Duration::from_secs(2))
            .connect()
            .await
            .unwrap();

        let first = transport.recv().await.unwrap().unwrap();
        assert!(first.contains("room_created"));
        let second = transport.recv().await.unwrap().unwrap();
        assert!(second.contains("consent_required"));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xFF, 0xD8].into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"type":"all_photos_in"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let msg = transport.recv().await.unwrap().unwrap();
        assert_eq!(msg, r#"{"type":"all_photos_in"}"#);
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(r#"{"type":"ready","data":{}}"#.to_string())
            .await
            .unwrap();
        assert_eq!(seen_rx.await.unwrap(), r#"{"type":"ready","data":{}}"#);
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        // Closing twice is fine.
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, RoomError::TransportClosed));
    }
}
