//! # FamiliMatch Room Client
//!
//! Client side of the FamiliMatch room protocol: a small group of players
//! joins a room, consents to biometric comparison, uploads one photo each and
//! receives a face-similarity result pushed by the server.
//!
//! The crate is split into a pure state machine and the async plumbing that
//! feeds it:
//!
//! - [`session`]: [`Session`], the client's view of its room. No I/O.
//! - [`codec`] / [`protocol`]: the `{type, data}` JSON envelope and the typed
//!   commands and events carried in it.
//! - [`client`]: [`RoomClient`], which owns one channel task at a time and
//!   publishes every state change through a `tokio::sync::watch` channel.
//! - [`transport`]: the [`Transport`] and [`Connector`] traits. The default
//!   `transport-websocket` feature provides [`WebSocketConnector`].
//! - [`input`]: checks for names and room codes typed by the user.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use familimatch_room::{RoomClient, RoomConfig, RoomType};
//!
//! # async fn run() {
//! let client = RoomClient::websocket(RoomConfig::from_env());
//! let mut session = client.subscribe();
//!
//! let host = client.downgrade();
//! client.connect_then(move || {
//!     if let Some(host) = host.upgrade() {
//!         host.create_room("Alice", RoomType::Duo);
//!     }
//! });
//!
//! while session.changed().await.is_ok() {
//!     let state = session.borrow_and_update().clone();
//!     println!("{:?} in phase {}", state.room_code(), state.phase());
//! }
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod input;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{RoomClient, RoomConfig, WeakRoomClient};
pub use error::RoomError;
pub use input::{DisplayName, RoomCodeInput};
pub use protocol::{ClientMessage, RoomType, ServerMessage};
pub use session::{ConnectionStatus, Phase, Session};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
