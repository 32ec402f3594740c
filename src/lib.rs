//! # save-relay
//!
//! Chunked blob transfer for peer-to-peer game sessions.
//!
//! A joining peer asks the host for data too large for one datagram (the
//! world save, its own player save). The host answers with a `Heading`, a run
//! of `Chunk` packets and a `Footer`; the requester reassembles the blob per
//! sending peer and hands the decoded value to a completion callback.
//!
//! ## Layers
//! - [`transport`]: the synchronous datagram contract plus an in-memory network
//! - [`core`]: packet framing and blobs
//! - [`protocol`]: sender, reassembler, per-kind coordinator, dispatcher
//! - [`domain`]: world and player save collaborators
//! - [`service`]: the [`RelayNode`] tick driver
//!
//! ```rust
//! use save_relay::domain::{BincodeWorldSerializer, WorldDataDomain, WorldSave};
//! use save_relay::transport::local::LocalNetwork;
//! use save_relay::{RelayConfig, RelayNode};
//! use std::sync::{mpsc, Arc, RwLock};
//!
//! let net = LocalNetwork::new();
//! let world = Arc::new(RwLock::new(WorldSave { name: "isle".into(), ..Default::default() }));
//!
//! let mut host = RelayNode::new(Arc::new(net.endpoint("host")), RelayConfig::default()).unwrap();
//! host.add_transfer(WorldDataDomain::new(BincodeWorldSerializer::new(world)));
//!
//! let mut guest = RelayNode::new(Arc::new(net.endpoint("guest")), RelayConfig::default()).unwrap();
//! let worlds = guest.add_transfer(WorldDataDomain::new(BincodeWorldSerializer::default()));
//!
//! let (tx, rx) = mpsc::channel();
//! worlds.request(&"host".into(), move |r| tx.send(r).unwrap()).unwrap();
//! host.poll();
//! guest.poll();
//! assert_eq!(rx.recv().unwrap().unwrap().name, "isle");
//! ```

#![cfg_attr(not(test), warn(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::RelayConfig;
pub use crate::core::blob::Blob;
pub use crate::core::packet::{Packet, PacketKind};
pub use crate::domain::{TransferDomain, TransferKind};
pub use crate::error::{Result, TransferError};
pub use crate::protocol::{Dispatcher, RequestId, TransferManager};
pub use crate::service::RelayNode;
pub use crate::transport::{PeerId, Transport};
