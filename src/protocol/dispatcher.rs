use super::coordinator::ChannelHandler;
use crate::core::packet::{encode, Packet, PacketKind};
use crate::error::constants::ERR_DISPATCHER_LOCK;
use crate::error::{ProtocolError, Result, TransferError};
use crate::transport::{channels, Datagram, PeerId, Reliability, Transport};
use crate::utils::Metrics;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, instrument, trace, warn};

type HandlerFn = dyn Fn(&PeerId, &Bytes) + Send + Sync + 'static;

/// Routes inbound datagrams.
///
/// Transfer packets go to the coordinator registered on the datagram's
/// channel. Sibling kinds (chat, state sync) go to handlers registered per kind.
pub struct Dispatcher<T: Transport> {
    transport: Arc<T>,
    channels: HashMap<u8, Arc<dyn ChannelHandler>>,
    handlers: Arc<RwLock<HashMap<PacketKind, Box<HandlerFn>>>>,
    metrics: Arc<Metrics>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: Arc<T>, metrics: Arc<Metrics>) -> Self {
        Self {
            transport,
            channels: HashMap::new(),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            metrics,
        }
    }

    /// Route a transfer kind's channel to `handler`, replacing any previous one.
    pub fn register_transfer(&mut self, handler: Arc<dyn ChannelHandler>) {
        let kind = handler.kind();
        if let Some(old) = self.channels.insert(kind.channel, handler) {
            warn!(channel = kind.channel, replaced = %old.kind(), with = %kind, "Channel handler replaced");
        }
    }

    /// Handle a sibling message kind. Transfer kinds are routed by channel
    /// and cannot be registered here.
    pub fn register<F>(&self, kind: PacketKind, handler: F) -> Result<()>
    where
        F: Fn(&PeerId, &Bytes) + Send + Sync + 'static,
    {
        if kind.is_transfer() {
            return Err(TransferError::Internal(
                "transfer packet kinds are routed by channel",
            ));
        }

        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| TransferError::Internal(ERR_DISPATCHER_LOCK))?;
        handlers.insert(kind, Box::new(handler));
        Ok(())
    }

    /// Send a small, non-chunked message on the shared message channel.
    pub fn send_message(&self, to: &PeerId, kind: PacketKind, payload: &[u8]) -> Result<()> {
        if kind.is_transfer() {
            return Err(TransferError::Internal(
                "transfer packet kinds are sent by their coordinator",
            ));
        }
        let bytes = encode(kind, payload);
        self.transport
            .send(
                self.transport.local_id(),
                to,
                channels::MESSAGES,
                Reliability::ReliableOrdered,
                &bytes,
            )
            .map_err(|e| {
                self.metrics.send_failure();
                TransferError::SendFailed(e)
            })
    }

    /// Decode and route one datagram.
    pub fn dispatch(&self, datagram: Datagram, now: Instant) -> std::result::Result<(), ProtocolError> {
        let packet = Packet::from_bytes(&datagram.bytes)?;
        trace!(from = %datagram.sender, channel = datagram.channel, kind = %packet.kind, "Dispatching");

        if packet.kind.is_transfer() {
            let handler = self
                .channels
                .get(&datagram.channel)
                .ok_or(ProtocolError::UnroutedChannel(datagram.channel))?;
            handler.handle(&datagram.sender, packet, now);
            return Ok(());
        }

        let handlers = match self.handlers.read() {
            Ok(handlers) => handlers,
            Err(_) => {
                warn!("{}", ERR_DISPATCHER_LOCK);
                return Ok(());
            }
        };
        let handler = handlers
            .get(&packet.kind)
            .ok_or(ProtocolError::UnhandledKind(packet.kind.name()))?;
        handler(&datagram.sender, &packet.payload);
        Ok(())
    }

    /// One dispatch cycle: drain every queued datagram, then expire deadlines.
    ///
    /// Returns the number of datagrams consumed.
    #[instrument(skip(self, now), level = "trace")]
    pub fn poll_at(&self, now: Instant) -> usize {
        let mut drained = 0;
        while let Some(datagram) = self.transport.try_receive() {
            drained += 1;
            let sender = datagram.sender.clone();
            if let Err(e) = self.dispatch(datagram, now) {
                self.metrics.protocol_error();
                debug!(from = %sender, error = %e, "Dropping packet");
            }
        }

        for handler in self.channels.values() {
            handler.expire(now);
        }
        drained
    }

    pub fn poll(&self) -> usize {
        self.poll_at(Instant::now())
    }
}
