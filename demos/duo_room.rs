//! # Duo Room Example
//!
//! Plays one side of a duo match against a real FamiliMatch server:
//!
//! 1. Connect over WebSocket
//! 2. Create a room (or join one when `ROOM_CODE` is set)
//! 3. Grant consent, upload a photo and mark ready
//! 4. Print analysis progress, the countdown and the result
//!
//! ## Running
//!
//! ```sh
//! # Host a room:
//! PLAYER_NAME=Alice cargo run --example duo_room
//!
//! # Join it from a second terminal with the printed code:
//! PLAYER_NAME=Bob ROOM_CODE=5678 cargo run --example duo_room
//!
//! # Point at another server, send a real photo:
//! MATCH_SERVER_URL=ws://my-server:8030/ws/match \
//!     MATCH_PHOTO="data:image/jpeg;base64,$(base64 -w0 me.jpg)" \
//!     cargo run --example duo_room
//! ```

use familimatch_room::{
    ConnectionStatus, DisplayName, Phase, RoomClient, RoomCodeInput, RoomConfig, RoomType,
};

/// Stand-in photo when `MATCH_PHOTO` is not set.
const PLACEHOLDER_PHOTO: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQAAAQABAAD/2Q==";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=familimatch_room=debug` to watch every frame.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Input ───────────────────────────────────────────────────────
    let name = DisplayName::parse(&std::env::var("PLAYER_NAME").unwrap_or_else(|_| "Rusty".into()))?;
    let room_code = std::env::var("ROOM_CODE")
        .ok()
        .map(|raw| RoomCodeInput::parse(&raw))
        .transpose()?;
    let photo = std::env::var("MATCH_PHOTO").unwrap_or_else(|_| PLACEHOLDER_PHOTO.to_string());

    let config = RoomConfig::from_env();
    tracing::info!("Connecting to {}", config.server_url);

    // ── Connect and enter the room ──────────────────────────────────
    let client = RoomClient::websocket(config);
    let mut session = client.subscribe();

    let entry = client.downgrade();
    client.connect_then(move || {
        let Some(entry) = entry.upgrade() else {
            return;
        };
        match room_code {
            Some(code) => entry.join_room(name, code),
            None => entry.create_room(name, RoomType::Duo),
        }
    });

    // ── React to session changes ────────────────────────────────────
    let mut announced_code = false;
    let mut started = false;
    let mut uploaded = false;

    loop {
        tokio::select! {
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = session.borrow_and_update().clone();

                if let Some(error) = state.last_error() {
                    tracing::error!("Server says: {error}");
                }
                match state.status() {
                    ConnectionStatus::Error => break,
                    ConnectionStatus::Disconnected if state.result().is_none() => {
                        tracing::warn!("Server closed the room");
                        break;
                    }
                    _ => {}
                }

                if !announced_code {
                    if let Some(code) = state.room_code() {
                        tracing::info!("In room {code}; share it with a friend");
                        announced_code = true;
                    }
                }

                match state.phase() {
                    Phase::Lobby => {
                        let names: Vec<_> =
                            state.roster().iter().map(|p| p.display_name.as_str()).collect();
                        tracing::info!("Lobby: {}", names.join(", "));
                        if state.is_host() && state.can_start() && !started {
                            started = true;
                            client.room_ready();
                        }
                    }
                    Phase::ConsentPending => {
                        // A real UI would ask the user here.
                        tracing::info!("Granting biometric consent");
                        client.grant_consent();
                    }
                    Phase::Upload if !uploaded => {
                        uploaded = true;
                        client.upload_photo(&photo);
                        client.mark_ready();
                        tracing::info!("Photo sent, waiting for the others");
                    }
                    Phase::Analyzing(progress) => {
                        tracing::info!("{} ({:.0}%)", progress.step, progress.percent);
                    }
                    Phase::Countdown { seconds } => tracing::info!("Reveal in {seconds}…"),
                    Phase::Revealed(result) => {
                        tracing::info!("Result: {}", result.payload);
                        break;
                    }
                    _ => {}
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, leaving the room");
                client.leave();
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    Ok(())
}
