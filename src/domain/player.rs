//! Player save transfers.
//!
//! The host keeps one save file per player at `players/<peer>.sav`. A joining
//! player requests theirs; a player the host has never seen gets NotFound.

use super::{Persistence, TransferDomain, TransferKind};
use crate::core::blob::Blob;
use crate::error::{ApplicationError, DomainError};
use crate::transport::PeerId;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerSave {
    pub player: String,
    pub position: [f32; 3],
    pub health: u32,
    pub inventory: Vec<ItemStack>,
}

pub struct PlayerSaveDomain<P> {
    persistence: P,
    dir: PathBuf,
}

impl<P: Persistence> PlayerSaveDomain<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            persistence,
            dir: PathBuf::from("players"),
        }
    }

    /// File holding `peer`'s save, relative to the persistence root.
    ///
    /// ASCII alphanumerics and `-` are kept; every other byte, `_` included,
    /// becomes `_xx` hex, so distinct peers never share a file.
    pub fn path_for(&self, peer: &PeerId) -> PathBuf {
        let mut name = String::with_capacity(peer.as_str().len());
        for byte in peer.as_str().bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("_{byte:02x}"));
            }
        }
        self.dir.join(format!("{name}.sav"))
    }

    pub fn store(&self, peer: &PeerId, save: &PlayerSave) -> Result<(), ApplicationError> {
        let bytes = bincode::serialize(save).map_err(|e| ApplicationError::Serialize(e.to_string()))?;
        self.persistence.write_file(&self.path_for(peer), &bytes)?;
        debug!(peer = %peer, bytes = bytes.len(), "Player save stored");
        Ok(())
    }

    pub fn load(&self, peer: &PeerId) -> Result<Option<PlayerSave>, ApplicationError> {
        match self.persistence.read_file(&self.path_for(peer)) {
            Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl<P: Persistence> TransferDomain for PlayerSaveDomain<P> {
    type Item = PlayerSave;

    fn kind(&self) -> TransferKind {
        TransferKind::PLAYER_SAVE_DATA
    }

    fn produce(&mut self, requester: &PeerId) -> Result<Blob, DomainError> {
        match self.persistence.read_file(&self.path_for(requester)) {
            Ok(bytes) => Ok(Blob::from(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DomainError::NotFound(format!("no save for player {requester}")))
            }
            Err(e) => Err(ApplicationError::Io(e).into()),
        }
    }

    fn decode(&self, blob: &Blob) -> Result<PlayerSave, ApplicationError> {
        Ok(bincode::deserialize(blob)?)
    }
}
