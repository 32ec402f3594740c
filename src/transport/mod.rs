//! # Transport Layer
//!
//! Contract for the peer-to-peer datagram primitive the protocol rides on.
//!
//! Session setup, NAT traversal and lobby membership live below this trait;
//! the protocol only sends and polls opaque datagrams.
//!
//! ## Ordering dependency
//! Every protocol packet is sent with [`Reliability::ReliableOrdered`]. The
//! reassembler has no sequence numbers and relies on the transport delivering
//! packets from one peer on one channel losslessly and in send order. A
//! transport that cannot guarantee this must not be used with this crate.
//!
//! ## Channels
//! Each transfer kind owns one channel; sibling messages use
//! [`channels::MESSAGES`].

pub mod local;

use crate::error::TransportError;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Largest datagram the reference transport accepts.
pub const MAX_PACKET_SIZE: usize = 1170;

pub mod channels {
    /// Sibling, non-chunked messages
    pub const MESSAGES: u8 = 0;
    /// World data transfers
    pub const WORLD_DATA: u8 = 1;
    /// Player save transfers
    pub const PLAYER_SAVE_DATA: u8 = 2;
}

/// Opaque identity of a peer as assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(Arc<str>);

impl PeerId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Unreliable,
    ReliableUnordered,
    ReliableOrdered,
}

/// One inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub sender: PeerId,
    pub channel: u8,
    pub bytes: Bytes,
}

/// Synchronous datagram transport.
///
/// Neither call blocks: `send` hands the buffer to the transport and reports
/// the result code, `try_receive` returns `None` once the inbound queue is empty.
pub trait Transport: Send + Sync {
    /// Identity of this endpoint.
    fn local_id(&self) -> &PeerId;

    fn send(
        &self,
        local: &PeerId,
        remote: &PeerId,
        channel: u8,
        reliability: Reliability,
        bytes: &[u8],
    ) -> Result<(), TransportError>;

    fn try_receive(&self) -> Option<Datagram>;
}

