//! # Loopback Room Example
//!
//! Implements [`Transport`] and [`Connector`] over in-process channels and
//! drives a whole duo match against a scripted fake server. Useful as:
//!
//! - **A template** for plugging the client into another I/O layer
//! - **A walkthrough** of the room flow without a running server
//!
//! ## Running
//!
//! ```sh
//! RUST_LOG=familimatch_room=debug cargo run --example loopback_room
//! ```

use async_trait::async_trait;
use familimatch_room::codec::Envelope;
use familimatch_room::{
    Connector, Phase, RoomClient, RoomConfig, RoomError, RoomType, Transport,
};
use serde_json::json;
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-backed transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback.
pub struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), RoomError> {
        self.tx
            .send(message)
            .map_err(|e| RoomError::TransportSend(e.to_string()))
    }

    /// `mpsc::UnboundedReceiver::recv` is cancel-safe, as the client requires.
    async fn recv(&mut self) -> Option<Result<String, RoomError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), RoomError> {
        self.rx.close();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: A connector that starts a fake server per connection
// ─────────────────────────────────────────────────────────────────────

struct LoopbackConnector;

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport, RoomError> {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        tokio::spawn(fake_server(server_rx, server_tx));
        Ok(LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: The fake server
// ─────────────────────────────────────────────────────────────────────

fn frame(kind: &str, data: serde_json::Value) -> String {
    json!({"type": kind, "data": data}).to_string()
}

/// Answers one host through a duo match, inventing a second player "Bob".
async fn fake_server(
    mut from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
) {
    while let Some(text) = from_client.recv().await {
        let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else {
            continue;
        };
        let mut replies = Vec::new();
        match envelope.kind.as_str() {
            "create_room" => {
                replies.push(frame(
                    "room_created",
                    json!({"room_code": "5678", "player_id": "p_1", "room_type": "duo"}),
                ));
                replies.push(frame(
                    "player_joined",
                    json!({"players": [
                        {"id": "p_1", "name": envelope.data["name"]},
                        {"id": "p_2", "name": "Bob"}
                    ]}),
                ));
            }
            "grant_consent" => {
                replies.push(frame("consent_granted", json!({"player_id": "p_1"})));
            }
            "upload_photo" => {
                replies.push(frame("photo_received", json!({"player_id": "p_1"})));
            }
            "ready" => {
                replies.push(frame("all_photos_in", json!({})));
                for (step, progress) in [
                    ("Detecting faces...", 20),
                    ("Comparing features...", 60),
                    ("Scoring...", 100),
                ] {
                    replies.push(frame("analyzing", json!({"step": step, "progress": progress})));
                }
                for seconds in (1..=3).rev() {
                    replies.push(frame("countdown", json!({"seconds": seconds})));
                }
                replies.push(frame(
                    "reveal",
                    json!({"percentage": 78, "label": "Strong family resemblance"}),
                ));
            }
            "leave" => break,
            other => tracing::warn!("fake server ignoring {other}"),
        }
        for reply in replies {
            if to_client.send(reply).is_err() {
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 4: Drive the client
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let client = RoomClient::new(LoopbackConnector, RoomConfig::default());
    let mut session = client.subscribe();

    let host = client.downgrade();
    client.connect_then(move || {
        if let Some(host) = host.upgrade() {
            host.create_room("Alice", RoomType::Duo);
        }
    });

    let mut started = false;
    let mut uploaded = false;
    while session.changed().await.is_ok() {
        let state = session.borrow_and_update().clone();
        match state.phase() {
            Phase::Lobby if state.can_start() && !started => {
                started = true;
                println!(
                    "room {} is full: {} players",
                    state.room_code().unwrap_or("?"),
                    state.roster().len()
                );
                client.room_ready();
            }
            Phase::ConsentPending => {
                println!("granting consent");
                client.grant_consent();
            }
            Phase::Upload if !uploaded => {
                uploaded = true;
                client.upload_photo("data:image/jpeg;base64,/9j/4AAQ");
                client.mark_ready();
            }
            Phase::Analyzing(progress) => println!("{} {:.0}%", progress.step, progress.percent),
            Phase::Countdown { seconds } => println!("reveal in {seconds}"),
            Phase::Revealed(result) => {
                println!("result: {}", result.payload);
                break;
            }
            _ => {}
        }
    }

    client.leave();
    client.shutdown().await;
}
