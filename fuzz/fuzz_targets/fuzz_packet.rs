#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use save_relay::core::blob::{parse_request_id, HeadingInfo};
use save_relay::Packet;

fuzz_target!(|data: &[u8]| {
    // Packet decoding and header parsing must never panic
    if let Ok(packet) = Packet::from_bytes(&Bytes::copy_from_slice(data)) {
        let _ = HeadingInfo::parse(&packet.payload);
        let _ = parse_request_id(&packet.payload);
    }
});
