//! Runtime driver for a relay node.

pub mod node;

pub use node::RelayNode;
