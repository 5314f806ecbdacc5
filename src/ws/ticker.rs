//! Periodic wake-up for a session's preparer.
//!
//! Without client traffic the preparer would never run its change check,
//! so the ticker feeds an [`Inbound::Tick`] into the inbox on a fixed
//! period. There is no backpressure handling: a full inbox simply delays
//! the next tick.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::messages::Inbound;
use crate::domain::SessionId;

/// Sends a tick into the inbox every `period` until cancelled or until
/// the inbox is closed. The first tick is sent immediately.
pub async fn run_ticker(
    session: SessionId,
    period: Duration,
    inbox: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
) {
    tracing::debug!(session = %session, ?period, "spawn ticker");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        let delivered = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = inbox.send(Inbound::Tick) => sent.is_ok(),
        };
        if !delivered {
            break;
        }
    }

    tracing::debug!(session = %session, "close ticker");
}
