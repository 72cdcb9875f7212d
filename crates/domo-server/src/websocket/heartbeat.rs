//! Subscriber liveness.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::subscriber::Subscriber;

/// Why [`watch_liveness`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No inbound frame for the whole miss budget.
    Lost {
        /// Time since the last inbound frame.
        silent_for: Duration,
    },
    /// The session ended first.
    Stopped,
}

/// Consecutive silent intervals tolerated: `timeout / interval`, at least 1.
pub fn miss_budget(interval: Duration, timeout: Duration) -> u32 {
    let per_tick = interval.as_millis().max(1);
    u32::try_from((timeout.as_millis() / per_tick).max(1)).unwrap_or(u32::MAX)
}

/// Poll a subscriber's alive flag every `interval` until it stays silent for
/// [`miss_budget`] ticks in a row or `cancel` fires.
pub async fn watch_liveness(
    subscriber: Arc<Subscriber>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> Liveness {
    let budget = miss_budget(interval, timeout);
    let mut ticks = time::interval(interval);
    let _ = ticks.tick().await;
    let mut silent = 0u32;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Liveness::Stopped,
            _ = ticks.tick() => {}
        }

        if subscriber.check_alive() {
            silent = 0;
            continue;
        }
        silent += 1;
        if silent >= budget {
            return Liveness::Lost {
                silent_for: subscriber.last_seen_elapsed(),
            };
        }
    }
}
