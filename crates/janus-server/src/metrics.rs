//! Process-wide bridge counters.
//!
//! Counters only increase and reset with the process. The live-connection
//! gauge is tied to [`ConnectionGuard`] so every exit path of a WebSocket
//! session decrements it.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Atomic counters shared across all handlers.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    messages_processed: AtomicU64,
    messages_failed: AtomicU64,
    auth_failures: AtomicU64,
    active_connections: AtomicUsize,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub auth_failures: u64,
    pub active_connections: usize,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the live-connection gauge until the guard is dropped.
    pub fn open_connection(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            metrics: Arc::clone(self),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            active_connections: self.active_connections(),
        }
    }

    /// Renders the counters as `name value` lines.
    pub fn render(&self, registered_agents: usize) -> String {
        let snap = self.snapshot();
        let mut out = String::new();
        for (name, value) in [
            ("neural_link_messages_processed_total", snap.messages_processed),
            ("neural_link_messages_failed_total", snap.messages_failed),
            ("neural_link_auth_failures_total", snap.auth_failures),
            ("neural_link_active_connections", snap.active_connections as u64),
            ("neural_link_registered_agents", registered_agents as u64),
        ] {
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

/// Decrements the live-connection gauge on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    metrics: Arc<BridgeMetrics>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
