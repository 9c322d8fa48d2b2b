//! Envelope codec for the room protocol.
//!
//! Outbound frames are produced from typed [`ClientMessage`]s (or from a raw
//! `type` plus JSON payload). Inbound frames are parsed in two steps: first
//! into a loose [`Envelope`], then the payload is decoded according to the
//! `type`. A frame that fails either step is reported as
//! [`RoomError::MalformedFrame`] so the caller can log and drop it; an unknown
//! `type` decodes to `Ok(None)`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RoomError};
use crate::protocol::{ClientMessage, ServerMessage};

/// The `{type, data}` frame shared by both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope, substituting `{}` for a null payload.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::EmptyMessageType`] if `kind` is empty.
    pub fn new(kind: impl Into<String>, data: Value) -> Result<Self> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(RoomError::EmptyMessageType);
        }
        Ok(Self {
            kind,
            data: or_empty_object(data),
        })
    }
}

/// Serialize a typed command into a text frame.
///
/// # Errors
///
/// Returns [`RoomError::Serialization`] if serde fails, which only happens for
/// payloads that cannot be represented as JSON.
pub fn encode(msg: &ClientMessage) -> Result<String> {
    Ok(serde_json::to_string(msg)?)
}

/// Serialize an arbitrary command name and payload into a text frame.
///
/// # Errors
///
/// Returns [`RoomError::EmptyMessageType`] if `kind` is empty.
pub fn encode_raw(kind: &str, data: Value) -> Result<String> {
    let envelope = Envelope::new(kind, data)?;
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse an inbound text frame.
///
/// Returns `Ok(None)` for a well-formed envelope whose `type` this client does
/// not know.
///
/// # Errors
///
/// Returns [`RoomError::MalformedFrame`] for invalid JSON, a missing or empty
/// `type`, or a payload that does not match the type's field contract.
pub fn decode(text: &str) -> Result<Option<ServerMessage>> {
    let Envelope { kind, data } =
        serde_json::from_str(text).map_err(|e| RoomError::MalformedFrame(e.to_string()))?;
    if kind.is_empty() {
        return Err(RoomError::MalformedFrame("empty message type".into()));
    }

    let msg = match kind.as_str() {
        "room_created" => ServerMessage::RoomCreated(payload(&kind, data)?),
        "player_joined" => ServerMessage::PlayerJoined(payload(&kind, data)?),
        "player_left" => ServerMessage::PlayerLeft(payload(&kind, data)?),
        "consent_required" => ServerMessage::ConsentRequired,
        "consent_granted" => ServerMessage::ConsentGranted(payload(&kind, data)?),
        "photo_received" => ServerMessage::PhotoReceived(payload(&kind, data)?),
        "all_photos_in" => ServerMessage::AllPhotosIn,
        "analyzing" => ServerMessage::Analyzing(payload(&kind, data)?),
        "countdown" => ServerMessage::Countdown(payload(&kind, data)?),
        "reveal" => ServerMessage::Reveal(data),
        "group_reveal" => ServerMessage::GroupReveal(data),
        "error" => ServerMessage::Error(payload(&kind, data)?),
        _ => return Ok(None),
    };
    Ok(Some(msg))
}

/// Remove a `data:` URI header, keeping only what follows the first comma.
///
/// Input without a comma is returned unchanged.
pub fn strip_data_uri_prefix(image: &str) -> &str {
    image.split_once(',').map_or(image, |(_, raw)| raw)
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T> {
    serde_json::from_value(or_empty_object(data))
        .map_err(|e| RoomError::MalformedFrame(format!("{kind}: {e}")))
}

fn or_empty_object(data: Value) -> Value {
    if data.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        data
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
    use crate::protocol::{CountdownPayload, RoomType};
    use serde_json::json;

    #[test]
    fn encode_wraps_command_in_type_and_data() {
        let frame = encode(&ClientMessage::CreateRoom {
            name: "Alice".into(),
            room_type: RoomType::Duo,
        })
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({ "type": "create_room", "data": { "name": "Alice", "room_type": "duo" } })
        );
    }

    #[test]
    fn payloadless_commands_carry_empty_data_object() {
        for msg in [
            ClientMessage::GrantConsent {},
            ClientMessage::Ready {},
            ClientMessage::Leave {},
        ] {
            let value: Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
            assert_eq!(value["type"], msg.kind());
            assert_eq!(value["data"], json!({}));
        }
    }

    #[test]
    fn encode_raw_rejects_empty_type() {
        let err = encode_raw("", json!({})).unwrap_err();
        assert!(matches!(err, RoomError::EmptyMessageType));
    }

    #[test]
    fn encode_raw_passes_payload_verbatim() {
        let frame = encode_raw("custom", json!({ "nested": [1, 2, 3] })).unwrap();
        let envelope: Envelope = serde_json::from_str(&frame).unwrap();
        assert_eq!(envelope.kind, "custom");
        assert_eq!(envelope.data, json!({ "nested": [1, 2, 3] }));
    }

    #[test]
    fn encode_raw_escapes_arbitrary_kinds() {
        for kind in [r#"quote"d"#, "line\nbreak", "\u{0}", "émoji 🎉", "{}"] {
            let frame = encode_raw(kind, Value::Null).unwrap();
            let envelope: Envelope = serde_json::from_str(&frame).unwrap();
            assert_eq!(envelope.kind, kind);
            assert_eq!(envelope.data, json!({}));
        }
    }

    #[test]
    fn decode_countdown() {
        let msg = decode(r#"{"type":"countdown","data":{"seconds":3}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg, ServerMessage::Countdown(CountdownPayload { seconds: 3 }));
    }

    #[test]
    fn decode_tolerates_missing_data_for_unit_events() {
        let msg = decode(r#"{"type":"consent_required"}"#).unwrap().unwrap();
        assert_eq!(msg, ServerMessage::ConsentRequired);
        let msg = decode(r#"{"type":"photo_received","data":null}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(msg, ServerMessage::PhotoReceived(n) if n.player_id.is_none()));
    }

    #[test]
    fn decode_player_joined_defaults_missing_roster_to_empty() {
        let msg = decode(r#"{"type":"player_joined","data":{"player_id":"p_2"}}"#)
            .unwrap()
            .unwrap();
        let payload = match msg {
            ServerMessage::PlayerJoined(payload) => payload,
            other => panic!("expected PlayerJoined, got {other:?}"),
        };
        assert_eq!(payload.player_id.as_deref(), Some("p_2"));
        assert!(payload.players.is_empty());
    }

    #[test]
    fn decode_passes_reveal_payload_through_untouched() {
        let raw = json!({ "percentage": 78, "features": { "eyes": 0.9 }, "fusion_image": null });
        let frame = json!({ "type": "reveal", "data": raw.clone() }).to_string();
        let msg = decode(&frame).unwrap().unwrap();
        assert_eq!(msg, ServerMessage::Reveal(raw));
    }

    #[test]
    fn decode_unknown_type_is_none() {
        assert!(decode(r#"{"type":"game_started","data":{}}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        for frame in [
            "not json",
            "{}",
            r#"{"data":{}}"#,
            r#"{"type":""}"#,
            r#"{"type":42}"#,
            "[1,2,3]",
            r#"{"type":"countdown","data":{"seconds":-1}}"#,
            r#"{"type":"room_created","data":{"room_code":"1234"}}"#,
        ] {
            let err = decode(frame).unwrap_err();
            assert!(
                matches!(err, RoomError::MalformedFrame(_)),
                "{frame:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn strip_data_uri_prefix_removes_header() {
        assert_eq!(strip_data_uri_prefix("data:image/jpeg;base64,AAAA"), "AAAA");
    }

    #[test]
    fn strip_data_uri_prefix_keeps_bare_base64() {
        assert_eq!(strip_data_uri_prefix("AAAA"), "AAAA");
    }

    #[test]
    fn strip_data_uri_prefix_cuts_only_at_first_comma() {
        assert_eq!(strip_data_uri_prefix("data:x,AA,BB"), "AA,BB");
    }
}
