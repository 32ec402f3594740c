//! # Relay Node
//!
//! Owns a node's transport, dispatcher and metrics, and drives them on a
//! fixed tick. Every tick drains the transport and expires deadlines.
//!
//! The node can be polled by hand from an existing game loop via
//! [`RelayNode::poll`], or run on its own task with [`RelayNode::run`].

use crate::config::RelayConfig;
use crate::domain::TransferDomain;
use crate::error::ConfigError;
use crate::protocol::{Dispatcher, TransferManager};
use crate::transport::Transport;
use crate::utils::Metrics;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

pub struct RelayNode<T: Transport> {
    transport: Arc<T>,
    dispatcher: Dispatcher<T>,
    config: RelayConfig,
    metrics: Arc<Metrics>,
    ticks: u64,
}

impl<T: Transport + 'static> RelayNode<T> {
    /// Build a node over `transport`. The configuration is validated first.
    pub fn new(transport: Arc<T>, config: RelayConfig) -> Result<Self, ConfigError> {
        config.validate_strict()?;
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Dispatcher::new(transport.clone(), metrics.clone());
        info!(peer = %transport.local_id(), chunk_size = config.transfer.chunk_size, "Relay node created");
        Ok(Self {
            transport,
            dispatcher,
            config,
            metrics,
            ticks: 0,
        })
    }

    /// Create a coordinator for `domain` and route its channel to it.
    pub fn add_transfer<D: TransferDomain>(&mut self, domain: D) -> Arc<TransferManager<D, T>> {
        let manager = Arc::new(TransferManager::new(
            domain,
            self.transport.clone(),
            self.config.transfer.clone(),
            self.metrics.clone(),
        ));
        self.dispatcher.register_transfer(manager.clone());
        debug!(kind = %manager.transfer_kind(), "Transfer kind registered");
        manager
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn poll(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    /// One tick. Returns the number of datagrams consumed.
    pub fn poll_at(&mut self, now: Instant) -> usize {
        let drained = self.dispatcher.poll_at(now);
        self.ticks += 1;

        let every = self.config.node.log_metrics_every_ticks;
        if every > 0 && self.ticks % every == 0 {
            self.metrics.log_metrics();
        }
        drained
    }

    /// Tick until ctrl-c.
    pub async fn run(&mut self) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(()).await;
            }
        });
        self.run_with_shutdown(shutdown_rx).await
    }

    /// Tick until `shutdown_rx` yields or its sender is dropped.
    #[instrument(skip(self, shutdown_rx), fields(peer = %self.transport.local_id()))]
    pub async fn run_with_shutdown(&mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut ticker = interval(self.config.node.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick = ?self.config.node.tick_interval, "Relay node running");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(ticks = self.ticks, "Relay node shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll();
                }
            }
        }

        // Resolve whatever is already queued before handing back.
        self.poll();
        self.metrics.log_metrics();
    }
}
