//! Observability and Metrics
//!
//! Atomic counters for session activity. Every session keeps its own
//! [`Metrics`]; the process-wide instance from [`global_metrics`] aggregates
//! all sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for session operations
#[derive(Debug)]
pub struct Metrics {
    /// Total transports bound
    pub connections_total: AtomicU64,
    /// Currently open transports
    pub connections_active: AtomicU64,
    /// Total PDUs decoded and delivered
    pub pdus_received: AtomicU64,
    /// Total PDUs confirmed written
    pub pdus_sent: AtomicU64,
    /// Total bytes read from transports
    pub bytes_received: AtomicU64,
    /// Total bytes written to transports
    pub bytes_sent: AtomicU64,
    /// Responses with no pending handler
    pub unmatched_responses: AtomicU64,
    /// Pending handlers discarded on close or rebind
    pub abandoned_requests: AtomicU64,
    /// Sends refused because the transport was not writable
    pub rejected_sends: AtomicU64,
    /// Malformed input on an established connection
    pub decode_errors: AtomicU64,
    /// Socket or TLS failures
    pub transport_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            pdus_received: AtomicU64::new(0),
            pdus_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            unmatched_responses: AtomicU64::new(0),
            abandoned_requests: AtomicU64::new(0),
            rejected_sends: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn pdu_received(&self) {
        self.pdus_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pdu_sent(&self, byte_count: u64) {
        self.pdus_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn unmatched_response(&self) {
        self.unmatched_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_abandoned(&self, count: u64) {
        self.abandoned_requests.fetch_add(count, Ordering::Relaxed);
    }

    pub fn send_rejected(&self) {
        self.rejected_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            pdus_received: self.pdus_received.load(Ordering::Relaxed),
            pdus_sent: self.pdus_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            unmatched_responses: self.unmatched_responses.load(Ordering::Relaxed),
            abandoned_requests: self.abandoned_requests.load(Ordering::Relaxed),
            rejected_sends: self.rejected_sends.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            pdus_received = snapshot.pdus_received,
            pdus_sent = snapshot.pdus_sent,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            unmatched_responses = snapshot.unmatched_responses,
            abandoned_requests = snapshot.abandoned_requests,
            rejected_sends = snapshot.rejected_sends,
            decode_errors = snapshot.decode_errors,
            transport_errors = snapshot.transport_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub pdus_received: u64,
    pub pdus_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub unmatched_responses: u64,
    pub abandoned_requests: u64,
    pub rejected_sends: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the process-wide metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.pdu_sent(32);
        metrics.pdu_sent(16);
        metrics.unmatched_response();
        metrics.connection_closed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 1);
        assert_eq!(snapshot.connections_active, 0);
        assert_eq!(snapshot.pdus_sent, 2);
        assert_eq!(snapshot.bytes_sent, 48);
        assert_eq!(snapshot.unmatched_responses, 1);
    }
}
