//! Transport abstraction for the room protocol.
//!
//! A [`Transport`] is one open bidirectional text channel to the room server.
//! A [`Connector`] knows how to open a fresh one; the
//! [`RoomClient`](crate::client::RoomClient) calls it on every `connect()`
//! so that a reconnect always gets a brand-new channel rather than reviving
//! an old one.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use familimatch_room::error::RoomError;
//! use familimatch_room::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), RoomError> {
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, RoomError>> {
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), RoomError> {
//!         unimplemented!()
//!     }
//! }
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self) -> Result<MyTransport, RoomError> {
//!         unimplemented!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::RoomError;

/// A bidirectional text message transport.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON frame and
/// each call to [`recv`](Transport::recv) yields one.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe: the client polls it
/// inside `tokio::select!` alongside outbound commands and the shutdown signal.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::TransportSend`] or [`RoomError::TransportClosed`] if
    /// the frame could not be written.
    async fn send(&mut self, message: String) -> Result<(), RoomError>;

    /// Receive the next JSON text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: the channel failed
    /// - `None`: the server closed the channel
    async fn recv(&mut self) -> Option<Result<String, RoomError>>;

    /// Close the channel gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources must still be
    /// released.
    async fn close(&mut self) -> Result<(), RoomError>;
}

/// Opens new [`Transport`]s to a fixed room server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport produced by this connector.
    type Transport: Transport;

    /// Open a new channel. Resolving is the "open" signal.
    ///
    /// # Errors
    ///
    /// Any error is treated as a channel-level failure by the client.
    async fn connect(&self) -> Result<Self::Transport, RoomError>;
}
