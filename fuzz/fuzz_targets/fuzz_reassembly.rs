#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use save_relay::protocol::Reassembler;
use save_relay::{Packet, PeerId};
use std::time::{Duration, Instant};

// Input is a sequence of [peer][len][datagram] records from two peers.
fuzz_target!(|data: &[u8]| {
    let peers = [PeerId::new("a"), PeerId::new("b")];
    let mut r = Reassembler::new(Duration::from_secs(1), 64 * 1024);
    let now = Instant::now();

    let mut rest = data;
    while rest.len() >= 2 {
        let peer = &peers[(rest[0] & 1) as usize];
        let len = (rest[1] as usize).min(rest.len() - 2);
        let datagram = Bytes::copy_from_slice(&rest[2..2 + len]);
        rest = &rest[2 + len..];

        if let Ok(packet) = Packet::from_bytes(&datagram) {
            let _ = r.accept(peer, &packet, now);
        }
    }
    r.expire(now + Duration::from_secs(2));
    assert_eq!(r.in_progress(), 0);
});
