//! Background tasks for the bridge.
//!
//! Includes:
//! - Pruning agents whose heartbeat has expired.

use crate::AppState;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the heartbeat pruning task.
///
/// Runs indefinitely, removing connection records whose last heartbeat is
/// older than `timeout_secs`. Live sessions of pruned agents are closed.
pub async fn start_pruning_task(state: Arc<AppState>, timeout_secs: u64) {
    if timeout_secs == 0 {
        tracing::warn!("heartbeat pruning disabled (timeout=0)");
        return;
    }

    // Check every timeout/2, capped at 60s and at least 1s
    let interval_seconds = (timeout_secs / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(timeout_secs, interval_seconds, "starting heartbeat pruning task");

    loop {
        sleep(interval).await;
        prune_once(&state, timeout_secs).await;
    }
}

/// Runs a single pruning pass and returns the removed agent ids.
pub async fn prune_once(state: &AppState, timeout_secs: u64) -> Vec<String> {
    // Timeouts beyond chrono's range can never expire.
    let cutoff = i64::try_from(timeout_secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|timeout| chrono::Utc::now().checked_sub_signed(timeout));
    let Some(cutoff) = cutoff else {
        return Vec::new();
    };

    let pruned = state.connections.prune_stale(cutoff).await;
    if !pruned.is_empty() {
        tracing::info!(count = pruned.len(), agents = ?pruned, "pruned agents with expired heartbeats");
    }
    pruned
}
