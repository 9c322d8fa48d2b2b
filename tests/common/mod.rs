#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for room client integration tests.
//!
//! [`LoopbackConnector`] hands every channel it opens to the test as a
//! [`LoopbackServer`], which can read what the client sent and push frames
//! back. Helper functions build server frames from the typed protocol.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use familimatch_room::codec::Envelope;
use familimatch_room::protocol::{
    AnalyzingPayload, CountdownPayload, ErrorPayload, PlayerInfo, PlayerJoinedPayload,
    PlayerLeftPayload, RoomCreatedPayload, RoomType, ServerMessage,
};
use familimatch_room::{Connector, RoomClient, RoomConfig, RoomError, Session, Transport};
use tokio::sync::{mpsc, watch, Semaphore};

/// How long any single wait in a test may take.
pub const WAIT: Duration = Duration::from_secs(2);

type Inbound = Option<Result<String, RoomError>>;

// ── Loopback transport ──────────────────────────────────────────────

/// Client end of a loopback channel.
pub struct LoopbackTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), RoomError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RoomError::TransportClosed);
        }
        self.outbound
            .send(message)
            .map_err(|_| RoomError::TransportClosed)
    }

    async fn recv(&mut self) -> Option<Result<String, RoomError>> {
        // A dropped server handle reads as a clean close.
        self.inbound.recv().await.flatten()
    }

    async fn close(&mut self) -> Result<(), RoomError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Server end of a loopback channel, owned by the test.
pub struct LoopbackServer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<Inbound>,
    closed: Arc<AtomicBool>,
}

impl LoopbackServer {
    /// Push one text frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.to_client.send(Some(Ok(frame.into())));
    }

    /// Make the client's next `recv` fail.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .to_client
            .send(Some(Err(RoomError::TransportReceive(reason.into()))));
    }

    /// Close the channel from the server side.
    pub fn hang_up(&self) {
        let _ = self.to_client.send(None);
    }

    /// Next frame the client sent, parsed as an envelope.
    pub async fn next_frame(&mut self) -> Envelope {
        let text = tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client dropped the channel");
        serde_json::from_str(&text).expect("client frame is not an envelope")
    }

    /// Frames the client has sent but the test has not read yet.
    pub fn pending_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Wait until the client drops its end and return any frames it sent
    /// on the way out.
    pub async fn wait_closed(&mut self) -> Vec<String> {
        tokio::time::timeout(WAIT, async {
            let mut frames = Vec::new();
            while let Some(frame) = self.from_client.recv().await {
                frames.push(frame);
            }
            frames
        })
        .await
        .expect("client never released the channel")
    }

    /// Whether the client called `close` on its end.
    pub fn closed_by_client(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let transport = LoopbackTransport {
        inbound,
        outbound,
        closed: Arc::clone(&closed),
    };
    let server = LoopbackServer {
        from_client,
        to_client,
        closed,
    };
    (transport, server)
}

// ── Connectors ──────────────────────────────────────────────────────

/// Opens loopback channels and sends their server ends to the test.
///
/// With a gate, each `connect` waits for one permit, which lets a test hold
/// the client in `Connecting`.
pub struct LoopbackConnector {
    servers: mpsc::UnboundedSender<LoopbackServer>,
    gate: Option<Arc<Semaphore>>,
}

impl LoopbackConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoopbackServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        (
            Self {
                servers,
                gate: None,
            },
            rx,
        )
    }

    pub fn gated() -> (Self, mpsc::UnboundedReceiver<LoopbackServer>, Arc<Semaphore>) {
        let (mut connector, rx) = Self::new();
        let gate = Arc::new(Semaphore::new(0));
        connector.gate = Some(Arc::clone(&gate));
        (connector, rx, gate)
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport, RoomError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| RoomError::TransportClosed)?
                .forget();
        }
        let (transport, server) = loopback_pair();
        self.servers
            .send(server)
            .map_err(|_| RoomError::TransportClosed)?;
        Ok(transport)
    }
}

/// A server that refuses every connection.
pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport, RoomError> {
        Err(RoomError::Io(std::io::ErrorKind::ConnectionRefused.into()))
    }
}

// ── Client helpers ──────────────────────────────────────────────────

/// A loopback client plus its session watcher and the stream of server ends.
pub fn start_client(
    config: RoomConfig,
) -> (
    RoomClient<LoopbackConnector>,
    watch::Receiver<Session>,
    mpsc::UnboundedReceiver<LoopbackServer>,
) {
    let (connector, servers) = LoopbackConnector::new();
    let client = RoomClient::new(connector, config);
    let session = client.subscribe();
    (client, session, servers)
}

/// Wait for the next channel the client opens.
pub async fn next_server(servers: &mut mpsc::UnboundedReceiver<LoopbackServer>) -> LoopbackServer {
    tokio::time::timeout(WAIT, servers.recv())
        .await
        .expect("timed out waiting for the client to connect")
        .expect("connector dropped")
}

/// Wait until the session satisfies `pred` and return a snapshot.
pub async fn wait_for(
    rx: &mut watch::Receiver<Session>,
    pred: impl FnMut(&Session) -> bool,
) -> Session {
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for session state")
        .map(|state| Session::clone(&state))
        .expect("client dropped")
}

/// Let spawned tasks run without waiting on anything in particular.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ── Server frames ───────────────────────────────────────────────────

fn frame(msg: &ServerMessage) -> String {
    serde_json::to_string(msg).expect("server frame serialization")
}

pub fn room_created_json(room_code: &str, player_id: &str) -> String {
    room_created_json_with(room_code, player_id, None)
}

pub fn room_created_json_with(
    room_code: &str,
    player_id: &str,
    room_type: Option<RoomType>,
) -> String {
    frame(&ServerMessage::RoomCreated(RoomCreatedPayload {
        room_code: room_code.into(),
        player_id: player_id.into(),
        room_type,
    }))
}

/// `player_joined` carrying the full roster as `(id, name)` pairs.
pub fn player_joined_json(player_id: Option<&str>, players: &[(&str, &str)]) -> String {
    frame(&ServerMessage::PlayerJoined(PlayerJoinedPayload {
        player_id: player_id.map(Into::into),
        players: players
            .iter()
            .map(|(id, name)| PlayerInfo {
                id: (*id).into(),
                name: (*name).into(),
                ready: false,
            })
            .collect(),
    }))
}

pub fn player_left_json(player_id: &str) -> String {
    frame(&ServerMessage::PlayerLeft(PlayerLeftPayload {
        player_id: player_id.into(),
    }))
}

pub fn consent_required_json() -> String {
    frame(&ServerMessage::ConsentRequired)
}

pub fn all_photos_in_json() -> String {
    frame(&ServerMessage::AllPhotosIn)
}

pub fn analyzing_json(step: &str, progress: f64) -> String {
    frame(&ServerMessage::Analyzing(AnalyzingPayload {
        step: step.into(),
        progress,
    }))
}

pub fn countdown_json(seconds: u32) -> String {
    frame(&ServerMessage::Countdown(CountdownPayload { seconds }))
}

pub fn reveal_json(result: serde_json::Value) -> String {
    frame(&ServerMessage::Reveal(result))
}

pub fn group_reveal_json(result: serde_json::Value) -> String {
    frame(&ServerMessage::GroupReveal(result))
}

pub fn error_json(message: &str) -> String {
    frame(&ServerMessage::Error(ErrorPayload {
        message: message.into(),
    }))
}
