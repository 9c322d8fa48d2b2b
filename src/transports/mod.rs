//! Concrete transports, each behind a Cargo feature.
//!
//! | Feature                | Transport / connector                              |
//! |------------------------|----------------------------------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`], [`WebSocketConnector`]     |

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
