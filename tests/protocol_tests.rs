#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the room protocol.
//!
//! Outbound commands are checked against the exact JSON the server expects.
//! Inbound fixtures mirror what the match server actually pushes, including
//! fields this client does not read.

use familimatch_room::codec::{self, Envelope};
use familimatch_room::protocol::{
    AnalyzingPayload, ClientMessage, CountdownPayload, PlayerJoinedPayload, RoomType,
    ServerMessage,
};
use familimatch_room::RoomError;
use serde_json::{json, Value};

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

/// Encode `msg` and parse the frame back into a plain JSON value.
fn wire(msg: &ClientMessage) -> Value {
    let text = codec::encode(msg).expect("encode");
    serde_json::from_str(&text).expect("frame is JSON")
}

fn decode_known(text: &str) -> ServerMessage {
    codec::decode(text)
        .expect("fixture should decode")
        .expect("fixture type should be known")
}

// ════════════════════════════════════════════════════════════════════
// Outbound commands
// ════════════════════════════════════════════════════════════════════

#[test]
fn create_room_wire_format() {
    let msg = ClientMessage::CreateRoom {
        name: "Alice".into(),
        room_type: RoomType::Group,
    };
    assert_eq!(
        wire(&msg),
        json!({"type": "create_room", "data": {"name": "Alice", "room_type": "group"}})
    );
}

#[test]
fn join_room_wire_format() {
    let msg = ClientMessage::JoinRoom {
        name: "Bob".into(),
        room_code: "5678".into(),
    };
    assert_eq!(
        wire(&msg),
        json!({"type": "join_room", "data": {"name": "Bob", "room_code": "5678"}})
    );
}

#[test]
fn upload_photo_wire_format() {
    let msg = ClientMessage::UploadPhoto {
        photo: "iVBORw0KGgo=".into(),
    };
    assert_eq!(
        wire(&msg),
        json!({"type": "upload_photo", "data": {"photo": "iVBORw0KGgo="}})
    );
}

#[test]
fn payloadless_commands_send_empty_object() {
    for (msg, kind) in [
        (ClientMessage::GrantConsent {}, "grant_consent"),
        (ClientMessage::Ready {}, "ready"),
        (ClientMessage::Leave {}, "leave"),
    ] {
        assert_eq!(msg.kind(), kind);
        assert_eq!(wire(&msg), json!({"type": kind, "data": {}}));
    }
}

#[test]
fn raw_frames_use_the_same_envelope() {
    let text = codec::encode_raw("nudge", json!({"player_id": "p_2"})).unwrap();
    let envelope: Envelope = serde_json::from_str(&text).unwrap();
    assert_eq!(envelope.kind, "nudge");
    assert_eq!(envelope.data, json!({"player_id": "p_2"}));

    assert!(matches!(
        codec::encode_raw("", Value::Null),
        Err(RoomError::EmptyMessageType)
    ));
}

#[test]
fn room_type_limits() {
    assert_eq!(RoomType::default(), RoomType::Duo);
    assert_eq!((RoomType::Duo.min_players(), RoomType::Duo.max_players()), (2, 2));
    assert_eq!(
        (RoomType::Group.min_players(), RoomType::Group.max_players()),
        (3, 6)
    );
    assert_eq!(RoomType::Group.to_string(), "group");
}

// ════════════════════════════════════════════════════════════════════
// Server JSON fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_room_created_from_server() {
    let text = r#"{
        "type": "room_created",
        "data": {"room_code": "5678", "player_id": "p_1", "room_type": "duo", "max_players": 2}
    }"#;
    match decode_known(text) {
        ServerMessage::RoomCreated(payload) => {
            assert_eq!(payload.room_code, "5678");
            assert_eq!(payload.player_id, "p_1");
            assert_eq!(payload.room_type, Some(RoomType::Duo));
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

#[test]
fn fixture_player_joined_from_server() {
    let text = r#"{
        "type": "player_joined",
        "data": {
            "player_id": "p_2",
            "players": [
                {"id": "p_1", "name": "Alice", "ready": true, "has_photo": false},
                {"id": "p_2", "name": "Bob"}
            ]
        }
    }"#;
    match decode_known(text) {
        ServerMessage::PlayerJoined(PlayerJoinedPayload { player_id, players }) => {
            assert_eq!(player_id.as_deref(), Some("p_2"));
            assert_eq!(players.len(), 2);
            assert!(players[0].ready);
            assert_eq!(players[1].name, "Bob");
            assert!(!players[1].ready);
        }
        other => panic!("expected PlayerJoined, got {other:?}"),
    }
}

#[test]
fn fixture_analyzing_from_server() {
    let text = r#"{"type":"analyzing","data":{"step":"Comparing features...","progress":60}}"#;
    assert_eq!(
        decode_known(text),
        ServerMessage::Analyzing(AnalyzingPayload {
            step: "Comparing features...".into(),
            progress: 60.0,
        })
    );
}

#[test]
fn fixture_null_fields_are_tolerated() {
    match decode_known(r#"{"type":"player_joined","data":{"player_id":"p_2","players":null}}"#) {
        ServerMessage::PlayerJoined(PlayerJoinedPayload { player_id, players }) => {
            assert_eq!(player_id.as_deref(), Some("p_2"));
            assert!(players.is_empty());
        }
        other => panic!("expected PlayerJoined, got {other:?}"),
    }

    for text in [
        r#"{"type":"analyzing","data":{"step":"Comparing features...","progress":null}}"#,
        r#"{"type":"analyzing","data":{"step":null,"progress":null}}"#,
    ] {
        assert!(
            matches!(decode_known(text), ServerMessage::Analyzing(p) if p.progress == 0.0),
            "{text}"
        );
    }
}

#[test]
fn fixture_countdown_from_server() {
    let text = r#"{"type":"countdown","data":{"seconds":3}}"#;
    assert_eq!(
        decode_known(text),
        ServerMessage::Countdown(CountdownPayload { seconds: 3 })
    );
}

#[test]
fn fixture_reveal_payload_is_passed_through() {
    let data = json!({
        "percentage": 78,
        "label": "Strong match",
        "features": {"eyes": 81.2, "nose": 70.4},
        "players": [{"id": "p_1"}, {"id": "p_2"}]
    });
    let text = json!({"type": "reveal", "data": data}).to_string();
    assert_eq!(decode_known(&text), ServerMessage::Reveal(data));
}

#[test]
fn fixture_group_reveal_payload_is_passed_through() {
    let data = json!({"matrix": [[100, 64, 22], [64, 100, 51], [22, 51, 100]]});
    let text = json!({"type": "group_reveal", "data": data}).to_string();
    assert_eq!(decode_known(&text), ServerMessage::GroupReveal(data));
}

#[test]
fn fixture_error_from_server() {
    let text = r#"{"type":"error","data":{"message":"Room not found"}}"#;
    match decode_known(text) {
        ServerMessage::Error(payload) => assert_eq!(payload.message, "Room not found"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[test]
fn unit_events_decode_with_or_without_data() {
    for text in [
        r#"{"type":"consent_required"}"#,
        r#"{"type":"consent_required","data":{}}"#,
        r#"{"type":"consent_required","data":null}"#,
    ] {
        assert_eq!(decode_known(text), ServerMessage::ConsentRequired, "{text}");
    }
    assert_eq!(
        decode_known(r#"{"type":"all_photos_in","data":{"count":2}}"#),
        ServerMessage::AllPhotosIn
    );
}

#[test]
fn informational_events_decode() {
    assert!(matches!(
        decode_known(r#"{"type":"consent_granted","data":{"player_id":"p_2"}}"#),
        ServerMessage::ConsentGranted(notice) if notice.player_id.as_deref() == Some("p_2")
    ));
    assert!(matches!(
        decode_known(r#"{"type":"photo_received","data":{}}"#),
        ServerMessage::PhotoReceived(notice) if notice.player_id.is_none()
    ));
}

#[test]
fn every_known_kind_matches_its_encoding() {
    let samples = [
        ServerMessage::ConsentRequired,
        ServerMessage::AllPhotosIn,
        ServerMessage::Countdown(CountdownPayload { seconds: 1 }),
        ServerMessage::Reveal(json!({})),
    ];
    for msg in samples {
        let text = serde_json::to_string(&msg).unwrap();
        let envelope: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(envelope.kind, msg.kind());
        assert!(ServerMessage::KINDS.contains(&msg.kind()));
        assert_eq!(decode_known(&text), msg);
    }
}

#[test]
fn unknown_type_is_not_an_error() {
    assert!(codec::decode(r#"{"type":"server_restarting","data":{"in":30}}"#)
        .unwrap()
        .is_none());
}

#[test]
fn contract_violations_are_malformed() {
    for text in [
        "",
        "[]",
        r#"{"data":{}}"#,
        r#"{"type":42,"data":{}}"#,
        r#"{"type":"room_created","data":{"room_code":"5678"}}"#,
        r#"{"type":"countdown","data":{"seconds":-1}}"#,
        r#"{"type":"player_left","data":"p_2"}"#,
    ] {
        assert!(
            matches!(codec::decode(text), Err(RoomError::MalformedFrame(_))),
            "{text:?} should be rejected"
        );
    }
}
