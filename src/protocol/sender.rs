//! Chunked sender: frames a blob as `Heading, Chunk*, Footer`.

use crate::core::blob::{Blob, HeadingInfo};
use crate::core::packet::{encode, Packet, PacketKind};
use crate::error::{Result, TransferError};
use crate::transport::{PeerId, Reliability, Transport};
use crate::utils::Metrics;
use std::iter;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Ordered packets carrying `blob`.
///
/// An empty blob yields exactly `Heading, Footer`. A `chunk_size` below 1 is
/// raised to 1.
pub fn frame(blob: &Blob, chunk_size: usize, request: Option<u64>) -> impl Iterator<Item = Packet> + '_ {
    let chunk_size = chunk_size.max(1);
    let heading = Packet::new(
        PacketKind::Heading,
        HeadingInfo::encode(blob.len() as u64, request),
    );
    iter::once(heading)
        .chain(
            blob.chunks(chunk_size)
                .map(|chunk| Packet::new(PacketKind::Chunk, chunk)),
        )
        .chain(iter::once(Packet::empty(PacketKind::Footer)))
}

pub struct ChunkedSender {
    chunk_size: usize,
    metrics: Arc<Metrics>,
}

impl ChunkedSender {
    /// `chunk_size` below 1 is raised to 1.
    pub fn new(chunk_size: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            metrics,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Push `blob` to `to` on `channel`. Returns the number of packets sent.
    ///
    /// Stops at the first failed send; the receiver then never sees a Footer
    /// and its reassembly state times out.
    #[instrument(skip(self, transport, blob), fields(peer = %to, bytes = blob.len()), level = "debug")]
    pub fn send<T: Transport + ?Sized>(
        &self,
        transport: &T,
        to: &PeerId,
        channel: u8,
        blob: &Blob,
        request: Option<u64>,
    ) -> Result<usize> {
        let local = transport.local_id();
        let mut sent = 0;

        for packet in frame(blob, self.chunk_size, request) {
            let bytes = encode(packet.kind, &packet.payload);
            if let Err(e) =
                transport.send(local, to, channel, Reliability::ReliableOrdered, &bytes)
            {
                self.metrics.send_failure();
                warn!(
                    peer = %to,
                    channel,
                    kind = %packet.kind,
                    sent,
                    error = %e,
                    "Chunked send aborted"
                );
                return Err(TransferError::SendFailed(e));
            }
            if packet.kind == PacketKind::Chunk {
                self.metrics.chunk_sent(packet.payload.len() as u64);
            }
            sent += 1;
        }

        debug!(peer = %to, channel, packets = sent, "Blob sent");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::decode;
    use crate::error::TransportError;
    use crate::transport::local::LocalNetwork;

    fn kinds(blob: &Blob, chunk_size: usize) -> Vec<PacketKind> {
        frame(blob, chunk_size, None).map(|p| p.kind).collect()
    }

    #[test]
    fn test_empty_blob_frames_heading_footer() {
        assert_eq!(
            kinds(&Blob::empty(), 16),
            vec![PacketKind::Heading, PacketKind::Footer]
        );
    }

    #[test]
    fn test_frame_order_and_heading() {
        let blob = Blob::from(vec![3u8; 40]);
        let packets: Vec<Packet> = frame(&blob, 16, Some(9)).collect();
        assert_eq!(packets.len(), 5);
        assert_eq!(packets[0].kind, PacketKind::Heading);
        assert_eq!(&packets[0].payload[..], b"size:40;request:9");
        assert_eq!(packets[1].payload.len(), 16);
        assert_eq!(packets[2].payload.len(), 16);
        assert_eq!(packets[3].payload.len(), 8);
        assert_eq!(packets[4].kind, PacketKind::Footer);
        assert!(packets[4].payload.is_empty());
    }

    #[test]
    fn test_send_over_transport() {
        let net = LocalNetwork::new();
        let a = net.endpoint("a");
        let b = net.endpoint("b");
        let metrics = Arc::new(Metrics::new());
        let sender = ChunkedSender::new(4, metrics.clone());

        let sent = sender
            .send(&a, b.local_id(), 1, &Blob::from(vec![1u8; 10]), None)
            .unwrap();
        assert_eq!(sent, 5);

        let mut seen = Vec::new();
        while let Some(d) = b.try_receive() {
            assert_eq!(d.channel, 1);
            seen.push(decode(&d.bytes).unwrap().0);
        }
        assert_eq!(
            seen,
            vec![
                PacketKind::Heading,
                PacketKind::Chunk,
                PacketKind::Chunk,
                PacketKind::Chunk,
                PacketKind::Footer
            ]
        );
        assert_eq!(metrics.snapshot().chunks_sent, 3);
        assert_eq!(metrics.snapshot().bytes_sent, 10);
    }

    #[test]
    fn test_failure_aborts_without_footer() {
        let net = LocalNetwork::new();
        let a = net.endpoint("a");
        let b = net.endpoint("b");
        let metrics = Arc::new(Metrics::new());
        let sender = ChunkedSender::new(4, metrics.clone());

        a.fail_after(2);
        let err = sender
            .send(&a, b.local_id(), 1, &Blob::from(vec![1u8; 32]), None)
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::SendFailed(TransportError::Rejected(_))
        ));

        let mut seen = Vec::new();
        while let Some(d) = b.try_receive() {
            seen.push(decode(&d.bytes).unwrap().0);
        }
        assert_eq!(seen, vec![PacketKind::Heading, PacketKind::Chunk]);
        assert_eq!(metrics.snapshot().send_failures, 1);
    }

    #[test]
    fn test_zero_chunk_size_clamped() {
        let sender = ChunkedSender::new(0, Arc::new(Metrics::new()));
        assert_eq!(sender.chunk_size(), 1);
    }

    #[test]
    fn test_frame_with_zero_chunk_size_uses_single_bytes() {
        let blob = Blob::from(&b"abc"[..]);
        let packets: Vec<Packet> = frame(&blob, 0, None).collect();
        assert_eq!(packets.len(), 5);
        assert!(packets[1..4].iter().all(|p| p.payload.len() == 1));
        assert_eq!(kinds(&Blob::empty(), 0), vec![PacketKind::Heading, PacketKind::Footer]);
    }
}
