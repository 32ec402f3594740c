//! Observability and Metrics
//!
//! Counters for transfer activity. Uses atomics so one instance can be shared
//! by every coordinator on a node through an `Arc<Metrics>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for transfer operations
#[derive(Debug)]
pub struct Metrics {
    /// Requests sent to peers
    pub requests_sent: AtomicU64,
    /// Requests answered with a blob
    pub requests_served: AtomicU64,
    /// Requests answered with NotFound
    pub not_found_sent: AtomicU64,
    /// Pending requests resolved successfully
    pub transfers_completed: AtomicU64,
    /// Pending requests resolved with an error
    pub transfers_failed: AtomicU64,
    /// Pending requests that hit their deadline
    pub timeouts: AtomicU64,
    /// Reassembly states purged for inactivity or superseded by a new heading
    pub transfers_discarded: AtomicU64,
    /// Chunk packets sent
    pub chunks_sent: AtomicU64,
    /// Chunk packets received
    pub chunks_received: AtomicU64,
    /// Blob bytes sent
    pub bytes_sent: AtomicU64,
    /// Blob bytes reassembled
    pub bytes_received: AtomicU64,
    /// Packets dropped as malformed or unexpected
    pub protocol_errors: AtomicU64,
    /// Transport send failures
    pub send_failures: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            requests_served: AtomicU64::new(0),
            not_found_sent: AtomicU64::new(0),
            transfers_completed: AtomicU64::new(0),
            transfers_failed: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            transfers_discarded: AtomicU64::new(0),
            chunks_sent: AtomicU64::new(0),
            chunks_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_served(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn not_found_sent(&self) {
        self.not_found_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_completed(&self, byte_count: u64) {
        self.transfers_completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn transfer_failed(&self) {
        self.transfers_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_discarded(&self) {
        self.transfers_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunk_sent(&self, byte_count: u64) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn chunk_received(&self) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            not_found_sent: self.not_found_sent.load(Ordering::Relaxed),
            transfers_completed: self.transfers_completed.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transfers_discarded: self.transfers_discarded.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            requests_sent = s.requests_sent,
            requests_served = s.requests_served,
            not_found_sent = s.not_found_sent,
            transfers_completed = s.transfers_completed,
            transfers_failed = s.transfers_failed,
            timeouts = s.timeouts,
            transfers_discarded = s.transfers_discarded,
            chunks_sent = s.chunks_sent,
            chunks_received = s.chunks_received,
            bytes_sent = s.bytes_sent,
            bytes_received = s.bytes_received,
            protocol_errors = s.protocol_errors,
            send_failures = s.send_failures,
            uptime_seconds = s.uptime_seconds,
            "Transfer metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub requests_served: u64,
    pub not_found_sent: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub timeouts: u64,
    pub transfers_discarded: u64,
    pub chunks_sent: u64,
    pub chunks_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub protocol_errors: u64,
    pub send_failures: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
