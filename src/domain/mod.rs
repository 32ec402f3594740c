//! # Transfer Domains
//!
//! The per-kind collaborators a [`TransferManager`](crate::protocol::TransferManager)
//! is parameterized over. A domain produces the blob a peer asked for and
//! decodes the blob this node received.
//!
//! ## Provided domains
//! - [`WorldDataDomain`]: the host's current world save
//! - [`PlayerSaveDomain`]: one save file per player, looked up by peer id

pub mod persistence;
pub mod player;
pub mod world;

use crate::core::blob::Blob;
use crate::error::{ApplicationError, DomainError};
use crate::transport::{channels, PeerId};
use std::fmt;

pub use persistence::{FsPersistence, MemoryPersistence, Persistence};
pub use player::{PlayerSave, PlayerSaveDomain};
pub use world::{BincodeWorldSerializer, WorldDataDomain, WorldSave, WorldSerializer};

/// A named category of blob exchange, bound to one transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferKind {
    pub name: &'static str,
    pub channel: u8,
}

impl TransferKind {
    pub const WORLD_DATA: TransferKind = TransferKind {
        name: "world-data",
        channel: channels::WORLD_DATA,
    };

    pub const PLAYER_SAVE_DATA: TransferKind = TransferKind {
        name: "player-save-data",
        channel: channels::PLAYER_SAVE_DATA,
    };
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Produces and consumes the blobs of one transfer kind.
pub trait TransferDomain: Send + 'static {
    /// What a completed transfer decodes into.
    type Item: Send + 'static;

    fn kind(&self) -> TransferKind;

    /// Blob to send back to `requester`.
    ///
    /// `DomainError::NotFound` is answered with a NotFound packet so the
    /// requester fails fast instead of waiting for its deadline.
    fn produce(&mut self, requester: &PeerId) -> Result<Blob, DomainError>;

    /// Decode a blob received from a peer.
    fn decode(&self, blob: &Blob) -> Result<Self::Item, ApplicationError>;
}
