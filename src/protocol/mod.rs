//! # Transfer Protocol
//!
//! Moving blobs larger than one datagram between peers.
//!
//! ## Flow
//! ```text
//! requester                              responder
//!   request() ── Request ──────────────▶  domain.produce()
//!             ◀── Heading, Chunk*, Footer ─ ChunkedSender
//!   Reassembler ─▶ domain.decode() ─▶ callback
//! ```
//!
//! ## Components
//! - **sender**: frames a blob and pushes it through the transport
//! - **reassembler**: per-peer state machine rebuilding blobs
//! - **coordinator**: `TransferManager<D, T>`, one per transfer kind
//! - **dispatcher**: drains the transport and routes packets

pub mod coordinator;
pub mod dispatcher;
pub mod reassembler;
pub mod sender;

pub use coordinator::{ChannelHandler, RequestId, TransferManager};
pub use dispatcher::Dispatcher;
pub use reassembler::{CompletedTransfer, Reassembler};
pub use sender::ChunkedSender;
