//! Wire types for the FamiliMatch room protocol.
//!
//! Every frame is a JSON envelope `{"type": "...", "data": {...}}`. Outbound
//! commands serialize directly through serde's adjacent tagging. Inbound
//! events are decoded by [`codec::decode`](crate::codec::decode), which
//! tolerates a missing `data` object and unknown types.

use serde::{Deserialize, Deserializer, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Server-assigned player identifier, opaque to the client.
pub type PlayerId = String;

/// Short room code used to share a room with friends.
pub type RoomCode = String;

// ── Enums ───────────────────────────────────────────────────────────

/// Kind of room requested by the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    /// Two players compared against each other.
    #[default]
    Duo,
    /// Three to six players compared pairwise into a matrix.
    Group,
}

impl RoomType {
    /// Smallest roster that can start the game.
    pub fn min_players(self) -> usize {
        match self {
            Self::Duo => 2,
            Self::Group => 3,
        }
    }

    /// Largest roster the server accepts.
    pub fn max_players(self) -> usize {
        match self {
            Self::Duo => 2,
            Self::Group => 6,
        }
    }

    /// Wire name (`"duo"` or `"group"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duo => "duo",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// A roster entry as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ready: bool,
}

// ── Payload structs ─────────────────────────────────────────────────

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Payload for `room_created`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomCreatedPayload {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    /// Echo of the requested room type. Older servers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomType>,
}

/// Payload for `player_joined`.
///
/// `players` is the complete roster after the join, not a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerJoinedPayload {
    /// Id of the player who joined. For a joining client this is its own id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub players: Vec<PlayerInfo>,
}

/// Payload for `player_left`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerLeftPayload {
    pub player_id: PlayerId,
}

/// Payload for the informational `consent_granted` and `photo_received` events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlayerNotice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
}

/// Payload for `analyzing`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzingPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub step: String,
    /// Percent complete, nominally `0..=100`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
}

/// Payload for `countdown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownPayload {
    pub seconds: u32,
}

/// Payload for `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub message: String,
}

// ── Messages ────────────────────────────────────────────────────────

/// Commands sent from client to server.
///
/// Payload-less commands are empty struct variants so they still carry
/// `"data": {}` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new room; the sender becomes host.
    CreateRoom { name: String, room_type: RoomType },
    /// Join an existing room by code.
    JoinRoom { name: String, room_code: RoomCode },
    /// Grant biometric consent for this session.
    GrantConsent {},
    /// Submit a photo as raw base64 (no `data:` URI prefix).
    UploadPhoto { photo: String },
    /// Signal readiness once the photo is in.
    Ready {},
    /// Leave the room.
    Leave {},
}

impl ClientMessage {
    /// Wire `type` of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::GrantConsent {} => "grant_consent",
            Self::UploadPhoto { .. } => "upload_photo",
            Self::Ready {} => "ready",
            Self::Leave {} => "leave",
        }
    }
}

/// Events pushed from server to client.
///
/// Only `Serialize` is derived; decoding goes through
/// [`codec::decode`](crate::codec::decode) so that unit events without a
/// `data` object and unknown types are handled uniformly.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The room this client requested was created.
    RoomCreated(RoomCreatedPayload),
    /// Someone (possibly this client) joined; carries the full roster.
    PlayerJoined(PlayerJoinedPayload),
    /// Someone left the room.
    PlayerLeft(PlayerLeftPayload),
    /// The server needs biometric consent before accepting photos.
    ConsentRequired,
    /// A player granted consent. Informational.
    ConsentGranted(PlayerNotice),
    /// The server stored a player's photo. Informational.
    PhotoReceived(PlayerNotice),
    /// Every player's photo has arrived.
    AllPhotosIn,
    /// Server-side analysis progress.
    Analyzing(AnalyzingPayload),
    /// Reveal countdown tick.
    Countdown(CountdownPayload),
    /// Duo comparison result, passed through untouched.
    Reveal(serde_json::Value),
    /// Group matrix result, passed through untouched.
    GroupReveal(serde_json::Value),
    /// Non-fatal server error.
    Error(ErrorPayload),
}

impl ServerMessage {
    /// Every inbound `type` this client understands.
    pub const KINDS: [&'static str; 12] = [
        "room_created",
        "player_joined",
        "player_left",
        "consent_required",
        "consent_granted",
        "photo_received",
        "all_photos_in",
        "analyzing",
        "countdown",
        "reveal",
        "group_reveal",
        "error",
    ];

    /// Wire `type` of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomCreated(_) => "room_created",
            Self::PlayerJoined(_) => "player_joined",
            Self::PlayerLeft(_) => "player_left",
            Self::ConsentRequired => "consent_required",
            Self::ConsentGranted(_) => "consent_granted",
            Self::PhotoReceived(_) => "photo_received",
            Self::AllPhotosIn => "all_photos_in",
            Self::Analyzing(_) => "analyzing",
            Self::Countdown(_) => "countdown",
            Self::Reveal(_) => "reveal",
            Self::GroupReveal(_) => "group_reveal",
            Self::Error(_) => "error",
        }
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

    #[test]
    fn client_kind_matches_serde_tag() {
        let commands = [
            ClientMessage::CreateRoom {
                name: "Alice".into(),
                room_type: RoomType::Duo,
            },
            ClientMessage::JoinRoom {
                name: "Bob".into(),
                room_code: "5678".into(),
            },
            ClientMessage::GrantConsent {},
            ClientMessage::UploadPhoto {
                photo: "AAAA".into(),
            },
            ClientMessage::Ready {},
            ClientMessage::Leave {},
        ];
        for msg in commands {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["type"], msg.kind());
            assert!(value["data"].is_object(), "{} must carry an object", msg.kind());
        }
    }

    #[test]
    fn server_kinds_are_unique() {
        let mut kinds = ServerMessage::KINDS.to_vec();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), ServerMessage::KINDS.len());
    }

    #[test]
    fn room_type_uses_lowercase_names() {
        assert_eq!(serde_json::to_value(RoomType::Duo).unwrap(), "duo");
        assert_eq!(
            serde_json::from_str::<RoomType>(r#""group""#).unwrap(),
            RoomType::Group
        );
        assert!(serde_json::from_str::<RoomType>(r#""Group""#).is_err());
    }

    #[test]
    fn player_info_ready_defaults_to_false() {
        let info: PlayerInfo = serde_json::from_str(r#"{"id":"p_1","name":"Alice"}"#).unwrap();
        assert!(!info.ready);
    }

    #[test]
    fn explicit_null_fields_fall_back_to_defaults() {
        let joined: PlayerJoinedPayload =
            serde_json::from_str(r#"{"player_id":"p_2","players":null}"#).unwrap();
        assert_eq!(joined.player_id.as_deref(), Some("p_2"));
        assert!(joined.players.is_empty());

        let analyzing: AnalyzingPayload =
            serde_json::from_str(r#"{"step":null,"progress":null}"#).unwrap();
        assert_eq!(analyzing.step, "");
        assert_eq!(analyzing.progress, 0.0);

        let info: PlayerInfo =
            serde_json::from_str(r#"{"id":"p_1","name":"Alice","ready":null}"#).unwrap();
        assert!(!info.ready);
    }

    #[test]
    fn null_tolerance_does_not_accept_wrong_types() {
        assert!(serde_json::from_str::<AnalyzingPayload>(r#"{"progress":"half"}"#).is_err());
        assert!(serde_json::from_str::<PlayerJoinedPayload>(r#"{"players":{}}"#).is_err());
    }
}
