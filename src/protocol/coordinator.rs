//! # Transfer Coordinator
//!
//! One [`TransferManager`] per transfer kind. As a requester it tracks pending
//! requests and resolves them from the reassembler; as a responder it answers
//! Request packets by asking its domain for a blob and chunking it back.
//!
//! Requests are correlated by a per-manager id carried in the Request payload
//! and echoed in the Heading. Peers that do not echo an id are matched to
//! their oldest outstanding request, which relies on ordered delivery.
//!
//! Callbacks run after the manager's lock is released, so a callback may
//! issue another request.

use super::reassembler::{CompletedTransfer, Reassembler};
use super::sender::ChunkedSender;
use crate::config::TransferConfig;
use crate::core::blob::{encode_request_id, parse_request_id};
use crate::core::packet::{encode, Packet, PacketKind};
use crate::domain::{TransferDomain, TransferKind};
use crate::error::constants::ERR_COORDINATOR_LOCK;
use crate::error::{DomainError, ProtocolError, Result, TransferError};
use crate::transport::{PeerId, Reliability, Transport};
use crate::utils::metrics::Timer;
use crate::utils::Metrics;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Correlation id returned by [`TransferManager::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Callback<I> = Box<dyn FnOnce(Result<I>) + Send + 'static>;

struct PendingRequest<I> {
    peer: PeerId,
    deadline: Instant,
    callback: Callback<I>,
}

/// Resolved callbacks waiting to run once the lock is dropped.
struct Completions<I>(Vec<(Callback<I>, Result<I>)>);

impl<I> Completions<I> {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn push(&mut self, callback: Callback<I>, outcome: Result<I>) {
        self.0.push((callback, outcome));
    }

    fn run(self) {
        for (callback, outcome) in self.0 {
            callback(outcome);
        }
    }
}

struct Inner<D: TransferDomain> {
    domain: D,
    reassembler: Reassembler,
    pending: BTreeMap<u64, PendingRequest<D::Item>>,
    next_id: u64,
}

impl<D: TransferDomain> Inner<D> {
    /// Pending request answered by a transfer from `peer`.
    fn take_pending(&mut self, peer: &PeerId, request: Option<u64>) -> Option<PendingRequest<D::Item>> {
        let id = match request {
            Some(id) => self.pending.get(&id).filter(|p| &p.peer == peer).map(|_| id)?,
            None => *self.pending.iter().find(|(_, p)| &p.peer == peer)?.0,
        };
        self.pending.remove(&id)
    }

    /// Remove request `id` and the partial transfer answering it.
    fn withdraw(&mut self, id: u64) -> Option<PendingRequest<D::Item>> {
        let peer = self.pending.get(&id)?.peer.clone();
        let oldest = self.pending.iter().find(|(_, p)| p.peer == peer).map(|(id, _)| *id);
        self.reassembler.discard(&peer, id, oldest == Some(id));
        self.pending.remove(&id)
    }
}

/// Inbound side of a transfer kind, as seen by the dispatcher.
pub trait ChannelHandler: Send + Sync {
    fn kind(&self) -> TransferKind;

    /// Handle one decoded transfer packet from `from`.
    fn handle(&self, from: &PeerId, packet: Packet, now: Instant);

    /// Resolve requests and purge reassembly states past their deadline.
    fn expire(&self, now: Instant);
}

pub struct TransferManager<D: TransferDomain, T: Transport> {
    kind: TransferKind,
    transport: Arc<T>,
    sender: ChunkedSender,
    config: TransferConfig,
    metrics: Arc<Metrics>,
    inner: Mutex<Inner<D>>,
}

impl<D: TransferDomain, T: Transport> TransferManager<D, T> {
    pub fn new(domain: D, transport: Arc<T>, config: TransferConfig, metrics: Arc<Metrics>) -> Self {
        let reassembler = Reassembler::new(config.reassembly_timeout, config.max_blob_size)
            .with_chunk_hint(config.chunk_size);
        Self {
            kind: domain.kind(),
            transport,
            sender: ChunkedSender::new(config.chunk_size, metrics.clone()),
            config,
            metrics,
            inner: Mutex::new(Inner {
                domain,
                reassembler,
                pending: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn transfer_kind(&self) -> TransferKind {
        self.kind
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<D>>> {
        self.inner
            .lock()
            .map_err(|_| TransferError::Internal(ERR_COORDINATOR_LOCK))
    }

    /// Ask `peer` for its blob. `on_complete` runs during a later poll.
    ///
    /// A failed Request send is reported here and `on_complete` is dropped
    /// without being called.
    pub fn request<F>(&self, peer: &PeerId, on_complete: F) -> Result<RequestId>
    where
        F: FnOnce(Result<D::Item>) + Send + 'static,
    {
        self.request_at(peer, Instant::now(), on_complete)
    }

    #[instrument(skip(self, now, on_complete), fields(kind = %self.kind, peer = %peer))]
    pub fn request_at<F>(&self, peer: &PeerId, now: Instant, on_complete: F) -> Result<RequestId>
    where
        F: FnOnce(Result<D::Item>) + Send + 'static,
    {
        let mut inner = self.lock()?;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.pending.insert(
            id,
            PendingRequest {
                peer: peer.clone(),
                deadline: now + self.config.request_timeout,
                callback: Box::new(on_complete),
            },
        );

        let bytes = encode(PacketKind::Request, &encode_request_id(Some(id)));
        if let Err(e) = self.transport.send(
            self.transport.local_id(),
            peer,
            self.kind.channel,
            Reliability::ReliableOrdered,
            &bytes,
        ) {
            inner.pending.remove(&id);
            self.metrics.send_failure();
            warn!(request_id = id, error = %e, "Request send failed");
            return Err(TransferError::SendFailed(e));
        }

        self.metrics.request_sent();
        debug!(request_id = id, "Request sent");
        Ok(RequestId(id))
    }

    /// Withdraw a pending request. Its callback receives `Cancelled`.
    pub fn cancel(&self, id: RequestId) -> Result<bool> {
        let mut done = Completions::new();
        {
            let mut inner = self.lock()?;
            let Some(pending) = inner.withdraw(id.0) else {
                return Ok(false);
            };
            debug!(kind = %self.kind, request_id = id.0, peer = %pending.peer, "Request cancelled");
            done.push(pending.callback, Err(TransferError::Cancelled));
        }
        done.run();
        Ok(true)
    }

    pub fn pending_requests(&self) -> usize {
        self.lock().map_or(0, |inner| inner.pending.len())
    }

    pub fn transfers_in_progress(&self) -> usize {
        self.lock().map_or(0, |inner| inner.reassembler.in_progress())
    }

    /// Run `f` against the domain, e.g. to store a received player save.
    pub fn with_domain<R>(&self, f: impl FnOnce(&mut D) -> R) -> Result<R> {
        let mut inner = self.lock()?;
        Ok(f(&mut inner.domain))
    }

    /// Answer a Request from `from`.
    fn respond(&self, from: &PeerId, payload: &[u8]) {
        let request = parse_request_id(payload);
        let produced = match self.lock() {
            Ok(mut inner) => {
                let _timer = Timer::start("produce_blob");
                inner.domain.produce(from)
            }
            Err(e) => {
                error!(kind = %self.kind, error = %e, "Cannot answer request");
                return;
            }
        };

        match produced {
            Ok(blob) => {
                let bytes = blob.len();
                if self
                    .sender
                    .send(&*self.transport, from, self.kind.channel, &blob, request)
                    .is_ok()
                {
                    self.metrics.request_served();
                    info!(kind = %self.kind, peer = %from, request_id = ?request, bytes, "Request served");
                }
            }
            Err(e) => {
                match &e {
                    DomainError::NotFound(what) => {
                        debug!(kind = %self.kind, peer = %from, what = %what, "Nothing to send")
                    }
                    DomainError::Application(err) => {
                        error!(kind = %self.kind, peer = %from, error = %err, "Failed to produce blob")
                    }
                }
                let bytes = encode(PacketKind::NotFound, &encode_request_id(request));
                match self.transport.send(
                    self.transport.local_id(),
                    from,
                    self.kind.channel,
                    Reliability::ReliableOrdered,
                    &bytes,
                ) {
                    Ok(()) => self.metrics.not_found_sent(),
                    Err(e) => {
                        self.metrics.send_failure();
                        warn!(kind = %self.kind, peer = %from, error = %e, "NotFound send failed");
                    }
                }
            }
        }
    }

    fn complete(&self, inner: &mut Inner<D>, done: CompletedTransfer, out: &mut Completions<D::Item>) {
        let Some(pending) = inner.take_pending(&done.peer, done.request) else {
            self.metrics.transfer_discarded();
            debug!(
                kind = %self.kind,
                peer = %done.peer,
                request_id = ?done.request,
                bytes = done.blob.len(),
                "Transfer completed with no matching request, dropping"
            );
            return;
        };

        match inner.domain.decode(&done.blob) {
            Ok(item) => {
                self.metrics.transfer_completed(done.blob.len() as u64);
                info!(kind = %self.kind, peer = %done.peer, bytes = done.blob.len(), "Transfer complete");
                out.push(pending.callback, Ok(item));
            }
            Err(e) => {
                self.metrics.transfer_failed();
                warn!(kind = %self.kind, peer = %done.peer, error = %e, "Received blob failed to decode");
                out.push(pending.callback, Err(TransferError::Application(e)));
            }
        }
    }

    fn not_found(&self, inner: &mut Inner<D>, from: &PeerId, payload: &[u8], out: &mut Completions<D::Item>) {
        let request = parse_request_id(payload);
        match inner.take_pending(from, request) {
            Some(pending) => {
                self.metrics.transfer_failed();
                info!(kind = %self.kind, peer = %from, request_id = ?request, "Peer has nothing to send");
                out.push(pending.callback, Err(TransferError::NotFound));
            }
            None => debug!(kind = %self.kind, peer = %from, "NotFound for no pending request"),
        }
    }

    fn protocol_error(&self, from: &PeerId, e: ProtocolError) {
        self.metrics.protocol_error();
        debug!(kind = %self.kind, peer = %from, error = %e, "Dropping packet");
    }
}

impl<D: TransferDomain, T: Transport> ChannelHandler for TransferManager<D, T> {
    fn kind(&self) -> TransferKind {
        self.kind
    }

    fn handle(&self, from: &PeerId, packet: Packet, now: Instant) {
        if packet.kind == PacketKind::Request {
            self.respond(from, &packet.payload);
            return;
        }

        let mut done = Completions::new();
        {
            let mut inner = match self.lock() {
                Ok(inner) => inner,
                Err(e) => {
                    error!(kind = %self.kind, error = %e, "Dropping packet");
                    return;
                }
            };

            match packet.kind {
                PacketKind::Heading => {
                    if inner.reassembler.on_heading(from, &packet.payload, now) {
                        self.metrics.transfer_discarded();
                    }
                }
                PacketKind::Chunk => match inner.reassembler.on_chunk(from, packet.payload, now) {
                    Ok(()) => self.metrics.chunk_received(),
                    Err(e) => self.protocol_error(from, e),
                },
                PacketKind::Footer => match inner.reassembler.on_footer(from) {
                    Ok(transfer) => self.complete(&mut inner, transfer, &mut done),
                    Err(e) => self.protocol_error(from, e),
                },
                PacketKind::NotFound => self.not_found(&mut inner, from, &packet.payload, &mut done),
                other => self.protocol_error(from, ProtocolError::UnhandledKind(other.name())),
            }
        }
        done.run();
    }

    fn expire(&self, now: Instant) {
        let mut done = Completions::new();
        {
            let Ok(mut inner) = self.lock() else {
                return;
            };

            let expired: Vec<u64> = inner
                .pending
                .iter()
                .filter(|(_, p)| p.deadline <= now)
                .map(|(id, _)| *id)
                .collect();

            for id in expired {
                if let Some(pending) = inner.withdraw(id) {
                    self.metrics.timeout();
                    self.metrics.transfer_failed();
                    warn!(
                        kind = %self.kind,
                        peer = %pending.peer,
                        request_id = id,
                        "Request timed out"
                    );
                    done.push(
                        pending.callback,
                        Err(TransferError::Timeout(self.config.request_timeout)),
                    );
                }
            }

            for _ in inner.reassembler.expire(now) {
                self.metrics.transfer_discarded();
            }
        }
        done.run();
    }
}
