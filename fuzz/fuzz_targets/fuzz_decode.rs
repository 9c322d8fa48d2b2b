#![no_main]

use familimatch_room::session::Session;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Whatever decodes must also be safe to apply to a live session.
    if let Ok(Some(msg)) = familimatch_room::codec::decode(text) {
        let mut session = Session::default();
        let generation = session.begin_connect();
        session.channel_opened(generation);
        session.apply(generation, msg);
    }
});
