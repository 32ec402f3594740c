//! # Core Protocol Components
//!
//! Packet framing and the blob type.
//!
//! ## Components
//! - **Packet**: one-byte kind tag followed by the raw payload
//! - **Blob**: immutable buffer being transferred, plus chunk slicing
//!
//! ## Wire Format
//! ```text
//! [Kind(1)] [Payload(N)]
//! ```
//!
//! A transfer on the wire is `Heading, Chunk*, Footer`, answered to a `Request`.

pub mod blob;
pub mod packet;
