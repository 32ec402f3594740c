//! # Packet
//!
//! One datagram on the wire:
//!
//! ```text
//! [Kind(1)] [Payload(N)]
//! ```
//!
//! There is no length prefix. The payload is whatever follows the kind byte in
//! the buffer the transport delivered.

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Closed set of packet kinds sharing one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Ask a peer for its blob of the channel's transfer kind
    Request = 0x01,
    /// Start of a chunked transfer
    Heading = 0x02,
    /// One slice of the blob
    Chunk = 0x03,
    /// End of a chunked transfer
    Footer = 0x04,
    /// The peer has nothing to send for a request
    NotFound = 0x05,
    /// Free-form chat line, never chunked
    Chat = 0x10,
    /// Small state sync message, never chunked
    StateSync = 0x11,
}

impl PacketKind {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(PacketKind::Request),
            0x02 => Some(PacketKind::Heading),
            0x03 => Some(PacketKind::Chunk),
            0x04 => Some(PacketKind::Footer),
            0x05 => Some(PacketKind::NotFound),
            0x10 => Some(PacketKind::Chat),
            0x11 => Some(PacketKind::StateSync),
            _ => None,
        }
    }

    /// Kinds owned by a transfer coordinator rather than a sibling handler.
    pub fn is_transfer(self) -> bool {
        matches!(
            self,
            PacketKind::Request
                | PacketKind::Heading
                | PacketKind::Chunk
                | PacketKind::Footer
                | PacketKind::NotFound
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketKind::Request => "REQUEST",
            PacketKind::Heading => "HEADING",
            PacketKind::Chunk => "CHUNK",
            PacketKind::Footer => "FOOTER",
            PacketKind::NotFound => "NOT_FOUND",
            PacketKind::Chat => "CHAT",
            PacketKind::StateSync => "STATE_SYNC",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn empty(kind: PacketKind) -> Self {
        Self {
            kind,
            payload: Bytes::new(),
        }
    }

    /// Encoded size in bytes.
    #[inline]
    pub fn wire_len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Serialize to `[kind][payload]`.
    pub fn to_bytes(&self) -> Bytes {
        encode(self.kind, &self.payload)
    }

    /// Parse a datagram. Never panics; the payload shares the input buffer.
    pub fn from_bytes(buf: &Bytes) -> Result<Self, ProtocolError> {
        let (&tag, _) = buf.split_first().ok_or(ProtocolError::EmptyPacket)?;
        let kind = PacketKind::from_byte(tag).ok_or(ProtocolError::UnknownKind(tag))?;
        Ok(Self {
            kind,
            payload: buf.slice(1..),
        })
    }
}

/// Encode a kind tag and payload into one flat buffer.
pub fn encode(kind: PacketKind, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.put_u8(kind.as_byte());
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode a flat buffer into its kind tag and payload.
pub fn decode(bytes: &[u8]) -> Result<(PacketKind, &[u8]), ProtocolError> {
    let (&tag, payload) = bytes.split_first().ok_or(ProtocolError::EmptyPacket)?;
    let kind = PacketKind::from_byte(tag).ok_or(ProtocolError::UnknownKind(tag))?;
    Ok((kind, payload))
}
