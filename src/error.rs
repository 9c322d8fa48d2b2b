//! Error types for the FamiliMatch room client.

use thiserror::Error;

/// Errors that can occur below the room state machine.
///
/// The state machine itself never returns these. Transport failures become
/// [`ConnectionStatus::Error`](crate::session::ConnectionStatus::Error) plus a
/// user-visible `last_error`, and malformed frames are dropped after logging.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize an outbound message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inbound frame was not a valid `{type, data}` envelope.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An outbound envelope was built with an empty `type`.
    #[error("message type must not be empty")]
    EmptyMessageType,

    /// A display name failed presentation-boundary validation.
    #[error("invalid display name: {0}")]
    InvalidDisplayName(&'static str),

    /// A room code failed presentation-boundary validation.
    #[error("invalid room code: {0}")]
    InvalidRoomCode(&'static str),

    /// Opening the channel took longer than the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for room client operations.
pub type Result<T> = std::result::Result<T, RoomError>;
