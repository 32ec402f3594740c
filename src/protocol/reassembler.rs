//! # Reassembler
//!
//! Rebuilds blobs from `Heading, Chunk*, Footer` sequences, one independent
//! state per sending peer.
//!
//! ```text
//! Idle --Heading--> Accumulating --Chunk--> Accumulating --Footer--> Idle (blob out)
//!                   Accumulating --Heading--> Accumulating (reset, warned)
//! Idle --Chunk/Footer--> Idle (ProtocolError, dropped)
//! ```
//!
//! The Footer is the only stop condition. The size in the Heading is advisory
//! and only used to pre-size the chunk list.

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::core::blob::{Blob, HeadingInfo};
use crate::core::packet::{Packet, PacketKind};
use crate::error::ProtocolError;
use crate::transport::PeerId;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound on chunk slots reserved from a Heading's advisory size.
const MAX_PRESIZED_CHUNKS: usize = 1024;

/// A finished transfer handed back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub peer: PeerId,
    pub blob: Blob,
    /// Request id echoed in the Heading, if any
    pub request: Option<u64>,
}

#[derive(Debug)]
struct TransferState {
    chunks: Vec<Bytes>,
    received: usize,
    expected_size: Option<u64>,
    request: Option<u64>,
    deadline: Instant,
}

#[derive(Debug)]
pub struct Reassembler {
    states: HashMap<PeerId, TransferState>,
    idle_timeout: Duration,
    max_blob_size: usize,
    chunk_hint: usize,
}

impl Reassembler {
    pub fn new(idle_timeout: Duration, max_blob_size: usize) -> Self {
        Self {
            states: HashMap::new(),
            idle_timeout,
            max_blob_size,
            chunk_hint: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Chunk size the sender is expected to use, for pre-sizing only.
    pub fn with_chunk_hint(mut self, chunk_size: usize) -> Self {
        self.chunk_hint = chunk_size.max(1);
        self
    }

    /// Feed one framing packet from `peer`.
    ///
    /// Returns the finished transfer when `packet` is the Footer.
    pub fn accept(
        &mut self,
        peer: &PeerId,
        packet: &Packet,
        now: Instant,
    ) -> Result<Option<CompletedTransfer>, ProtocolError> {
        match packet.kind {
            PacketKind::Heading => {
                self.on_heading(peer, &packet.payload, now);
                Ok(None)
            }
            PacketKind::Chunk => self.on_chunk(peer, packet.payload.clone(), now).map(|_| None),
            PacketKind::Footer => self.on_footer(peer).map(Some),
            other => Err(ProtocolError::UnhandledKind(other.name())),
        }
    }

    /// Start a fresh transfer. Returns true if an unfinished one was discarded.
    pub fn on_heading(&mut self, peer: &PeerId, payload: &[u8], now: Instant) -> bool {
        let info = HeadingInfo::parse(payload);
        let capacity = info.size.map_or(0, |size| {
            (size as usize)
                .min(self.max_blob_size)
                .div_ceil(self.chunk_hint)
                .min(MAX_PRESIZED_CHUNKS)
        });

        let state = TransferState {
            chunks: Vec::with_capacity(capacity),
            received: 0,
            expected_size: info.size,
            request: info.request,
            deadline: now + self.idle_timeout,
        };

        match self.states.insert(peer.clone(), state) {
            Some(stale) => {
                warn!(
                    peer = %peer,
                    discarded_bytes = stale.received,
                    discarded_request = ?stale.request,
                    "New heading before footer, discarding unfinished transfer"
                );
                true
            }
            None => {
                debug!(peer = %peer, size = ?info.size, request = ?info.request, "Transfer started");
                false
            }
        }
    }

    pub fn on_chunk(&mut self, peer: &PeerId, chunk: Bytes, now: Instant) -> Result<(), ProtocolError> {
        let state = self
            .states
            .get_mut(peer)
            .ok_or_else(|| ProtocolError::UnexpectedChunk {
                peer: peer.to_string(),
            })?;

        if state.received + chunk.len() > self.max_blob_size {
            self.states.remove(peer);
            warn!(peer = %peer, limit = self.max_blob_size, "Transfer exceeds size limit, discarding");
            return Err(ProtocolError::BlobTooLarge {
                peer: peer.to_string(),
                limit: self.max_blob_size,
            });
        }

        state.received += chunk.len();
        state.chunks.push(chunk);
        state.deadline = now + self.idle_timeout;
        Ok(())
    }

    pub fn on_footer(&mut self, peer: &PeerId) -> Result<CompletedTransfer, ProtocolError> {
        let state = self
            .states
            .remove(peer)
            .ok_or_else(|| ProtocolError::UnexpectedFooter {
                peer: peer.to_string(),
            })?;

        if let Some(expected) = state.expected_size {
            if expected != state.received as u64 {
                debug!(
                    peer = %peer,
                    expected,
                    received = state.received,
                    "Advisory size differs from received bytes"
                );
            }
        }

        let mut buf = BytesMut::with_capacity(state.received);
        for chunk in &state.chunks {
            buf.extend_from_slice(chunk);
        }

        Ok(CompletedTransfer {
            peer: peer.clone(),
            blob: Blob::new(buf.freeze()),
            request: state.request,
        })
    }

    /// Purge states whose inactivity deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<PeerId> {
        let expired: Vec<PeerId> = self
            .states
            .iter()
            .filter(|(_, s)| s.deadline <= now)
            .map(|(p, _)| p.clone())
            .collect();

        for peer in &expired {
            if let Some(state) = self.states.remove(peer) {
                warn!(
                    peer = %peer,
                    received = state.received,
                    request = ?state.request,
                    "Partial transfer timed out, purging"
                );
            }
        }
        expired
    }

    /// Drop the in-flight transfer from `peer` if it answers `request`.
    ///
    /// A state whose Heading carried no request id answers the oldest request
    /// pending to that peer, so it only matches when `oldest_pending` is set.
    pub fn discard(&mut self, peer: &PeerId, request: u64, oldest_pending: bool) -> bool {
        let matches = self.states.get(peer).is_some_and(|s| match s.request {
            Some(r) => r == request,
            None => oldest_pending,
        });
        if matches {
            self.states.remove(peer);
        }
        matches
    }

    pub fn is_accumulating(&self, peer: &PeerId) -> bool {
        self.states.contains_key(peer)
    }

    pub fn in_progress(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sender::frame;

    fn reassembler() -> Reassembler {
        Reassembler::new(Duration::from_secs(5), 1 << 20)
    }

    fn feed(r: &mut Reassembler, peer: &PeerId, blob: &Blob, chunk: usize) -> CompletedTransfer {
        let now = Instant::now();
        let mut out = None;
        for packet in frame(blob, chunk, None) {
            out = r.accept(peer, &packet, now).unwrap();
        }
        out.unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let mut r = reassembler();
        let peer = PeerId::new("a");
        let blob = Blob::from((0..5000u32).map(|i| i as u8).collect::<Vec<_>>());
        let done = feed(&mut r, &peer, &blob, 1024);
        assert_eq!(done.blob, blob);
        assert_eq!(done.peer, peer);
        assert_eq!(r.in_progress(), 0);
    }

    #[test]
    fn test_zero_length() {
        let mut r = reassembler();
        let peer = PeerId::new("a");
        let done = feed(&mut r, &peer, &Blob::empty(), 8);
        assert!(done.blob.is_empty());
    }

    #[test]
    fn test_chunk_while_idle() {
        let mut r = reassembler();
        let peer = PeerId::new("a");
        let err = r
            .on_chunk(&peer, Bytes::from_static(b"x"), Instant::now())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedChunk { .. }));
        assert_eq!(r.in_progress(), 0);
    }

    #[test]
    fn test_footer_while_idle() {
        let mut r = reassembler();
        let err = r.on_footer(&PeerId::new("a")).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedFooter { .. }));
    }

    #[test]
    fn test_reheading_discards_stale() {
        let mut r = reassembler();
        let peer = PeerId::new("a");
        let now = Instant::now();

        assert!(!r.on_heading(&peer, b"size:6", now));
        r.on_chunk(&peer, Bytes::from_static(b"old"), now).unwrap();
        r.on_chunk(&peer, Bytes::from_static(b"old"), now).unwrap();

        assert!(r.on_heading(&peer, b"size:3", now));
        r.on_chunk(&peer, Bytes::from_static(b"new"), now).unwrap();
        let done = r.on_footer(&peer).unwrap();
        assert_eq!(&done.blob[..], b"new");
    }

    #[test]
    fn test_peers_isolated() {
        let mut r = reassembler();
        let a = PeerId::new("a");
        let b = PeerId::new("b");
        let now = Instant::now();

        let blob_a = Blob::from(vec![0xAA; 300]);
        let blob_b = Blob::from(vec![0xBB; 170]);
        let mut pa: Vec<Packet> = frame(&blob_a, 64, None).collect();
        let mut pb: Vec<Packet> = frame(&blob_b, 64, None).collect();
        pa.reverse();
        pb.reverse();

        let mut done = Vec::new();
        while !pa.is_empty() || !pb.is_empty() {
            if let Some(p) = pa.pop() {
                done.extend(r.accept(&a, &p, now).unwrap());
            }
            if let Some(p) = pb.pop() {
                done.extend(r.accept(&b, &p, now).unwrap());
            }
        }

        assert_eq!(done.len(), 2);
        let got_a = done.iter().find(|d| d.peer == a).unwrap();
        let got_b = done.iter().find(|d| d.peer == b).unwrap();
        assert_eq!(got_a.blob, blob_a);
        assert_eq!(got_b.blob, blob_b);
    }

    #[test]
    fn test_expire_purges_and_late_footer_rejected() {
        let mut r = Reassembler::new(Duration::from_millis(50), 1 << 20);
        let peer = PeerId::new("a");
        let start = Instant::now();

        r.on_heading(&peer, b"size:10", start);
        r.on_chunk(&peer, Bytes::from_static(b"12345"), start).unwrap();
        assert!(r.expire(start + Duration::from_millis(10)).is_empty());

        let expired = r.expire(start + Duration::from_millis(60));
        assert_eq!(expired, vec![peer.clone()]);
        assert!(matches!(
            r.on_footer(&peer),
            Err(ProtocolError::UnexpectedFooter { .. })
        ));
    }

    #[test]
    fn test_chunk_refreshes_deadline() {
        let mut r = Reassembler::new(Duration::from_millis(50), 1 << 20);
        let peer = PeerId::new("a");
        let start = Instant::now();

        r.on_heading(&peer, b"", start);
        r.on_chunk(&peer, Bytes::from_static(b"x"), start + Duration::from_millis(40))
            .unwrap();
        assert!(r.expire(start + Duration::from_millis(60)).is_empty());
        assert!(r.is_accumulating(&peer));
    }

    #[test]
    fn test_size_limit() {
        let mut r = Reassembler::new(Duration::from_secs(1), 8);
        let peer = PeerId::new("a");
        let now = Instant::now();
        r.on_heading(&peer, b"size:100", now);
        r.on_chunk(&peer, Bytes::from_static(b"12345"), now).unwrap();
        let err = r
            .on_chunk(&peer, Bytes::from_static(b"6789"), now)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::BlobTooLarge { limit: 8, .. }));
        assert!(!r.is_accumulating(&peer));
    }

    #[test]
    fn test_request_id_carried() {
        let mut r = reassembler();
        let peer = PeerId::new("a");
        let now = Instant::now();
        let mut out = None;
        for p in frame(&Blob::from(vec![1u8; 3]), 2, Some(77)) {
            out = r.accept(&peer, &p, now).unwrap();
        }
        assert_eq!(out.unwrap().request, Some(77));
    }

    #[test]
    fn test_discard_matches_request() {
        let mut r = reassembler();
        let peer = PeerId::new("a");
        r.on_heading(&peer, b"size:1;request:5", Instant::now());
        assert!(!r.discard(&peer, 6, true));
        assert!(r.discard(&peer, 5, false));
        assert!(!r.is_accumulating(&peer));
    }

    #[test]
    fn test_unlabelled_transfer_discarded_only_for_oldest_request() {
        let mut r = reassembler();
        let peer = PeerId::new("a");
        r.on_heading(&peer, b"size:1", Instant::now());
        assert!(!r.discard(&peer, 9, false));
        assert!(r.is_accumulating(&peer));
        assert!(r.discard(&peer, 8, true));
        assert!(!r.is_accumulating(&peer));
    }

    #[test]
    fn test_heading_size_reserves_bounded_capacity() {
        let mut r = Reassembler::new(Duration::from_secs(10), 64 * 1024 * 1024).with_chunk_hint(1);
        let peer = PeerId::new("a");
        r.on_heading(&peer, b"size:67108864", Instant::now());
        let reserved = r.states.get(&peer).map(|s| s.chunks.capacity()).unwrap();
        assert!(reserved <= MAX_PRESIZED_CHUNKS, "reserved {reserved} slots");

        r.on_heading(&peer, b"size:18446744073709551615", Instant::now());
        let reserved = r.states.get(&peer).map(|s| s.chunks.capacity()).unwrap();
        assert!(reserved <= MAX_PRESIZED_CHUNKS);
    }
}
