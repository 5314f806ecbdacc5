//! Periodic statistics report.
//!
//! Logs the number of live sessions and tracked uids, but only when one of
//! them changed since the previous report, so an idle server stays quiet.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::{ConnectionCounter, RegistryHandle};

/// Figures compared between two reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Live subscriber sessions.
    pub sessions: usize,
    /// Distinct uids in the registry.
    pub tracked_uids: usize,
}

/// Reports every `period` until `shutdown` is cancelled or the registry
/// stops answering.
pub async fn run_stats_reporter(
    registry: RegistryHandle,
    connections: ConnectionCounter,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut previous = StatsSnapshot::default();

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }
        let Ok(stats) = registry.stats().await else {
            tracing::warn!("stats reporter stopped: registry unavailable");
            break;
        };
        let current = StatsSnapshot {
            sessions: connections.active(),
            tracked_uids: stats.tracked_uids,
        };
        if current != previous {
            tracing::info!(
                sessions = current.sessions,
                tracked_uids = current.tracked_uids,
                global_revision = stats.global_revision,
                "stats"
            );
            previous = current;
        }
    }
}
