//! World save transfers: the host serves its live world, joining peers decode it.

use super::{TransferDomain, TransferKind};
use crate::core::blob::Blob;
use crate::error::{ApplicationError, DomainError};
use crate::transport::PeerId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub tiles: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldSave {
    pub name: String,
    pub seed: u64,
    pub elapsed_ticks: u64,
    pub regions: Vec<Region>,
}

/// Converts the world save to and from bytes.
pub trait WorldSerializer: Send + 'static {
    fn serialize_world_save(&self) -> Result<Blob, ApplicationError>;
    fn deserialize_world_save(&self, bytes: &[u8]) -> Result<WorldSave, ApplicationError>;
}

/// Bincode serializer over a world shared with the simulation.
#[derive(Debug, Clone, Default)]
pub struct BincodeWorldSerializer {
    world: Arc<RwLock<WorldSave>>,
}

impl BincodeWorldSerializer {
    pub fn new(world: Arc<RwLock<WorldSave>>) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &Arc<RwLock<WorldSave>> {
        &self.world
    }
}

impl WorldSerializer for BincodeWorldSerializer {
    fn serialize_world_save(&self) -> Result<Blob, ApplicationError> {
        let world = self
            .world
            .read()
            .map_err(|_| ApplicationError::Serialize("world lock poisoned".to_string()))?;
        let bytes =
            bincode::serialize(&*world).map_err(|e| ApplicationError::Serialize(e.to_string()))?;
        debug!(world = %world.name, bytes = bytes.len(), "World save serialized");
        Ok(Blob::from(bytes))
    }

    fn deserialize_world_save(&self, bytes: &[u8]) -> Result<WorldSave, ApplicationError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

pub struct WorldDataDomain<S> {
    serializer: S,
}

impl<S: WorldSerializer> WorldDataDomain<S> {
    pub fn new(serializer: S) -> Self {
        Self { serializer }
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }
}

impl<S: WorldSerializer> TransferDomain for WorldDataDomain<S> {
    type Item = WorldSave;

    fn kind(&self) -> TransferKind {
        TransferKind::WORLD_DATA
    }

    fn produce(&mut self, _requester: &PeerId) -> Result<Blob, DomainError> {
        Ok(self.serializer.serialize_world_save()?)
    }

    fn decode(&self, blob: &Blob) -> Result<WorldSave, ApplicationError> {
        self.serializer.deserialize_world_save(blob)
    }
}
