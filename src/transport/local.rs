//! # In-Memory Transport
//!
//! Loopback implementation of [`Transport`] for tests, demos and local play.
//!
//! A [`LocalNetwork`] owns one FIFO mailbox per endpoint. Delivery is lossless
//! and ordered per sender, which satisfies the reliable-ordered contract.
//!
//! ```rust
//! use save_relay::transport::local::LocalNetwork;
//! use save_relay::transport::{Reliability, Transport};
//!
//! let network = LocalNetwork::new();
//! let host = network.endpoint("host");
//! let client = network.endpoint("client");
//!
//! client
//!     .send(client.local_id(), host.local_id(), 0, Reliability::ReliableOrdered, b"hi")
//!     .unwrap();
//! let datagram = host.try_receive().unwrap();
//! assert_eq!(&datagram.bytes[..], b"hi");
//! ```

use super::{Datagram, PeerId, Reliability, Transport, MAX_PACKET_SIZE};
use crate::error::TransportError;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

type Mailboxes = HashMap<PeerId, VecDeque<Datagram>>;

/// Shared set of in-memory mailboxes.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    mailboxes: Arc<Mutex<Mailboxes>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reattach to) the endpoint with this identity.
    pub fn endpoint(&self, id: impl AsRef<str>) -> LocalTransport {
        let id = PeerId::new(id);
        if let Ok(mut boxes) = self.mailboxes.lock() {
            boxes.entry(id.clone()).or_default();
        }
        debug!(peer = %id, "Local endpoint attached");
        LocalTransport {
            id,
            network: self.clone(),
            send_budget: AtomicUsize::new(usize::MAX),
            sent: AtomicUsize::new(0),
        }
    }

    /// Number of datagrams waiting for `peer`.
    pub fn queued(&self, peer: &PeerId) -> usize {
        self.mailboxes
            .lock()
            .map(|boxes| boxes.get(peer).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    /// Discard everything waiting for `peer`, simulating a lost burst.
    pub fn drop_queued(&self, peer: &PeerId) -> usize {
        let Ok(mut boxes) = self.mailboxes.lock() else {
            return 0;
        };
        let dropped = boxes.get_mut(peer).map_or(0, |q| q.drain(..).count());
        if dropped > 0 {
            warn!(peer = %peer, dropped, "Dropped queued datagrams");
        }
        dropped
    }

    fn deliver(&self, to: &PeerId, datagram: Datagram) -> Result<(), TransportError> {
        let mut boxes = self
            .mailboxes
            .lock()
            .map_err(|_| TransportError::Closed)?;
        let mailbox = boxes
            .get_mut(to)
            .ok_or_else(|| TransportError::Unreachable(to.to_string()))?;
        mailbox.push_back(datagram);
        Ok(())
    }

    fn take(&self, id: &PeerId) -> Option<Datagram> {
        self.mailboxes.lock().ok()?.get_mut(id)?.pop_front()
    }
}

/// One endpoint on a [`LocalNetwork`].
pub struct LocalTransport {
    id: PeerId,
    network: LocalNetwork,
    send_budget: AtomicUsize,
    sent: AtomicUsize,
}

impl LocalTransport {
    /// Let the next `n` sends succeed, then reject every send after that.
    pub fn fail_after(&self, n: usize) {
        self.send_budget.store(n, Ordering::SeqCst);
    }

    /// Lift any limit set by [`fail_after`](Self::fail_after).
    pub fn heal(&self) {
        self.send_budget.store(usize::MAX, Ordering::SeqCst);
    }

    /// Datagrams successfully sent from this endpoint.
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }
}

impl Transport for LocalTransport {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    fn send(
        &self,
        local: &PeerId,
        remote: &PeerId,
        channel: u8,
        _reliability: Reliability,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(TransportError::PacketTooLarge {
                size: bytes.len(),
                limit: MAX_PACKET_SIZE,
            });
        }

        let budget = self.send_budget.load(Ordering::SeqCst);
        if budget == 0 {
            return Err(TransportError::Rejected(format!(
                "send budget exhausted on {}",
                self.id
            )));
        }
        if budget != usize::MAX {
            self.send_budget.store(budget - 1, Ordering::SeqCst);
        }

        self.network.deliver(
            remote,
            Datagram {
                sender: local.clone(),
                channel,
                bytes: Bytes::copy_from_slice(bytes),
            },
        )?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        trace!(from = %local, to = %remote, channel, bytes = bytes.len(), "Datagram queued");
        Ok(())
    }

    fn try_receive(&self) -> Option<Datagram> {
        self.network.take(&self.id)
    }
}
