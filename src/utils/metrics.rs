//! Session Metrics
//!
//! Counters for one device session: messages and reports in each direction,
//! interactive prompts answered, and errors seen.
//!
//! Uses atomic counters so a shared reference can be handed to the transport
//! and the engine alike.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Traffic counters for one device session
#[derive(Debug)]
pub struct SessionMetrics {
    /// Logical messages sent
    pub messages_sent: AtomicU64,
    /// Logical messages received
    pub messages_received: AtomicU64,
    /// 64-byte reports written
    pub reports_sent: AtomicU64,
    /// 64-byte reports read
    pub reports_received: AtomicU64,
    /// Payload bytes sent
    pub bytes_sent: AtomicU64,
    /// Payload bytes received
    pub bytes_received: AtomicU64,
    /// Button, PIN and passphrase requests answered
    pub interactions: AtomicU64,
    /// Framing, schema and device errors
    pub protocol_errors: AtomicU64,
    start_time: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            reports_sent: AtomicU64::new(0),
            reports_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            interactions: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a message sent as `reports` reports
    pub fn message_sent(&self, byte_count: u64, reports: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
        self.reports_sent.fetch_add(reports, Ordering::Relaxed);
    }

    /// Record one report read from the device
    pub fn report_received(&self) {
        self.reports_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reassembled message
    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn interaction(&self) {
        self.interactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            reports_sent: self.reports_sent.load(Ordering::Relaxed),
            reports_received: self.reports_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            interactions: self.interactions.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            elapsed_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            messages_sent = snapshot.messages_sent,
            messages_received = snapshot.messages_received,
            reports_sent = snapshot.reports_sent,
            reports_received = snapshot.reports_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            interactions = snapshot.interactions,
            protocol_errors = snapshot.protocol_errors,
            elapsed_ms = snapshot.elapsed_ms,
            "Device session metrics"
        );
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reports_sent: u64,
    pub reports_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub interactions: u64,
    pub protocol_errors: u64,
    pub elapsed_ms: u64,
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
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
