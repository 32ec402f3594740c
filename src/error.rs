//! # Error Types
//!
//! Error handling for the blob-transfer protocol.
//!
//! Failures are split by who can act on them:
//!
//! ## Error Categories
//! - **TransportError**: the underlying datagram primitive refused a send
//! - **ProtocolError**: a malformed or out-of-place packet; dropped and logged
//! - **TransferError**: the outcome handed to a request's completion callback
//! - **ApplicationError**: a reconstructed blob that the domain could not decode
//! - **DomainError**: a collaborator that could not produce a blob to send
//! - **ConfigError**: configuration loading and validation failures
//!
//! ## Example Usage
//! ```rust
//! use save_relay::error::TransferError;
//! use tracing::{info, warn};
//!
//! fn report(outcome: Result<Vec<u8>, TransferError>) {
//!     match outcome {
//!         Ok(bytes) => info!(bytes = bytes.len(), "Transfer complete"),
//!         Err(e) if e.is_network() => warn!(error = %e, "Network problem"),
//!         Err(e) => warn!(error = %e, "Received corrupt data"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to keep the hot paths allocation free.
pub mod constants {
    /// Lock errors
    pub const ERR_COORDINATOR_LOCK: &str = "Failed to acquire lock on transfer coordinator";
    pub const ERR_DISPATCHER_LOCK: &str = "Failed to acquire lock on dispatcher";
}

/// Failure of the underlying datagram transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Transport rejected send: {0}")]
    Rejected(String),

    #[error("Transport closed")]
    Closed,

    #[error("Packet too large: {size} bytes (limit {limit})")]
    PacketTooLarge { size: usize, limit: usize },
}

/// Malformed or unexpected inbound packet.
///
/// These never reach a caller: the dispatcher drops the packet and logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty packet")]
    EmptyPacket,

    #[error("Unknown packet kind: {0:#04x}")]
    UnknownKind(u8),

    #[error("Chunk from {peer} with no transfer in progress")]
    UnexpectedChunk { peer: String },

    #[error("Footer from {peer} with no transfer in progress")]
    UnexpectedFooter { peer: String },

    #[error("Transfer from {peer} exceeds {limit} bytes")]
    BlobTooLarge { peer: String, limit: usize },

    #[error("No coordinator on channel {0}")]
    UnroutedChannel(u8),

    #[error("No handler for packet kind {0}")]
    UnhandledKind(&'static str),
}

/// Failure decoding or encoding domain data.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Deserialize error: {0}")]
    Deserialize(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<bincode::Error> for ApplicationError {
    fn from(e: bincode::Error) -> Self {
        ApplicationError::Deserialize(e.to_string())
    }
}

/// Failure of a domain collaborator asked to produce a blob.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Application(#[from] ApplicationError),
}

/// Outcome of a transfer, as seen by the caller of `request`.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Send failed: {0}")]
    SendFailed(#[from] TransportError),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Not found")]
    NotFound,

    #[error("Cancelled")]
    Cancelled,

    #[error("Corrupt data: {0}")]
    Application(#[from] ApplicationError),

    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl TransferError {
    /// True when the failure came from the network or the peer rather than
    /// from the received data itself.
    pub fn is_network(&self) -> bool {
        !matches!(self, TransferError::Application(_))
    }
}

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration validation failed:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Type alias for Results using TransferError
pub type Result<T> = std::result::Result<T, TransferError>;
