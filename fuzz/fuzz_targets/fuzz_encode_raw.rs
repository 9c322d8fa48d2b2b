#![no_main]

use familimatch_room::codec::{self, Envelope};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // First line is the frame type, the rest is the payload.
    let (kind, payload) = text.split_once('\n').unwrap_or((text, ""));
    let payload =
        serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_owned()));
    let was_null = payload.is_null();

    match codec::encode_raw(kind, payload) {
        Ok(frame) => {
            let envelope: Envelope =
                serde_json::from_str(&frame).expect("encoded frame must parse back");
            assert_eq!(envelope.kind, kind);
            if was_null {
                assert!(envelope.data.is_object());
            }
        }
        Err(_) => assert!(kind.is_empty()),
    }
});
