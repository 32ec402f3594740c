//! Property-based tests using proptest
//!
//! Framing and reassembly invariants over randomly generated blobs, chunk
//! sizes and interleavings.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::Bytes;
use proptest::prelude::*;
use save_relay::core::packet::{decode, Packet, PacketKind};
use save_relay::protocol::sender::frame;
use save_relay::protocol::Reassembler;
use save_relay::{Blob, PeerId};
use std::time::{Duration, Instant};

fn reassembler() -> Reassembler {
    Reassembler::new(Duration::from_secs(60), usize::MAX)
}

// Property: a framed blob reassembles to the same bytes
proptest! {
    #[test]
    fn prop_frame_then_reassemble(
        data in prop::collection::vec(any::<u8>(), 0..20_000),
        chunk_size in 1usize..2048,
    ) {
        let blob = Blob::from(data.clone());
        let peer = PeerId::new("peer");
        let mut r = reassembler();
        let now = Instant::now();

        let mut done = None;
        for packet in frame(&blob, chunk_size, None) {
            let wire = packet.to_bytes();
            let decoded = Packet::from_bytes(&wire).unwrap();
            if let Some(t) = r.accept(&peer, &decoded, now).unwrap() {
                done = Some(t);
            }
        }

        let done = done.expect("footer completes the transfer");
        prop_assert_eq!(done.blob.to_vec(), data);
        prop_assert!(!r.is_accumulating(&peer));
    }
}

// Property: framing emits Heading, ceil(len / chunk) Chunks, Footer
proptest! {
    #[test]
    fn prop_chunk_count_and_order(
        len in 0usize..50_000,
        chunk_size in 1usize..4096,
    ) {
        let blob = Blob::from(vec![7u8; len]);
        let packets: Vec<Packet> = frame(&blob, chunk_size, None).collect();

        prop_assert_eq!(packets.len(), len.div_ceil(chunk_size) + 2);
        prop_assert_eq!(packets[0].kind, PacketKind::Heading);
        prop_assert_eq!(packets[packets.len() - 1].kind, PacketKind::Footer);

        let chunks = &packets[1..packets.len() - 1];
        prop_assert!(chunks.iter().all(|p| p.kind == PacketKind::Chunk));
        prop_assert!(chunks.iter().all(|p| !p.payload.is_empty() && p.payload.len() <= chunk_size));
        prop_assert_eq!(chunks.iter().map(|p| p.payload.len()).sum::<usize>(), len);
    }
}

// Property: decoding never panics, and any decoded kind re-encodes to the same bytes
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..64)) {
        if let Ok((kind, payload)) = decode(&data) {
            let mut rebuilt = vec![kind.as_byte()];
            rebuilt.extend_from_slice(payload);
            prop_assert_eq!(rebuilt, data);
        }
    }
}

// Property: interleaving two senders' packets does not mix their blobs
proptest! {
    #[test]
    fn prop_interleaved_peers_isolated(
        a in prop::collection::vec(any::<u8>(), 0..3000),
        b in prop::collection::vec(any::<u8>(), 0..3000),
        chunk_size in 1usize..512,
        picks in prop::collection::vec(any::<bool>(), 0..64),
    ) {
        let (pa, pb) = (PeerId::new("a"), PeerId::new("b"));
        let (blob_a, blob_b) = (Blob::from(a.clone()), Blob::from(b.clone()));
        let mut fa = frame(&blob_a, chunk_size, None).peekable();
        let mut fb = frame(&blob_b, chunk_size, None).peekable();
        let mut r = reassembler();
        let now = Instant::now();
        let mut picks = picks.into_iter().cycle();

        let mut results: Vec<(PeerId, Bytes)> = Vec::new();
        loop {
            let take_a = match (fa.peek().is_some(), fb.peek().is_some()) {
                (false, false) => break,
                (true, false) => true,
                (false, true) => false,
                (true, true) => picks.next().unwrap_or(true),
            };
            let (peer, packet) = if take_a {
                (&pa, fa.next().unwrap())
            } else {
                (&pb, fb.next().unwrap())
            };
            if let Some(done) = r.accept(peer, &packet, now).unwrap() {
                results.push((done.peer, done.blob.into_bytes()));
            }
        }

        results.sort_by(|x, y| x.0.cmp(&y.0));
        prop_assert_eq!(results.len(), 2);
        prop_assert_eq!(&results[0].1[..], &a[..]);
        prop_assert_eq!(&results[1].1[..], &b[..]);
    }
}
