//! Gas reading ingestion and live subscription.
//!
//! [`GasMonitor`] owns the current-value cell and the broadcaster. Ingestion
//! and subscriber attachment take the same gate, which gives two guarantees:
//!
//! - the broadcast order equals the order in which values were stored
//! - a new subscriber's first frame is the value current at registration,
//!   and every later ingestion reaches it afterwards

use std::sync::Arc;

use domo_core::{ReadingCell, SensorReading, Snapshot, StatusTier};
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::metrics::GAS_READINGS_TOTAL;
use crate::websocket::broadcast::{BroadcastError, Broadcaster, PublishReport, SubscriberHandle};
use crate::websocket::subscriber::Frame;

/// Message pushed to live subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveUpdate {
    /// Raw sensor value.
    pub value: i64,
}

/// Result of one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// The stored reading.
    pub snapshot: Snapshot,
    /// Tier of the stored reading.
    pub tier: StatusTier,
    /// Fan-out result.
    pub report: PublishReport,
}

/// Current gas value plus its live subscribers.
pub struct GasMonitor {
    cell: ReadingCell,
    broadcaster: Arc<Broadcaster>,
    gate: Mutex<()>,
}

impl GasMonitor {
    /// Monitor starting at the sentinel value.
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            cell: ReadingCell::new(),
            broadcaster,
            gate: Mutex::new(()),
        }
    }

    /// Store `value`, classify it, and push it to every subscriber.
    pub fn ingest(&self, value: i64) -> IngestOutcome {
        let reading = SensorReading::now(value);
        let tier = reading.tier();

        let gate = self.gate.lock();
        let snapshot = self.cell.store(reading);
        let report = self.broadcaster.publish(&LiveUpdate { value });
        drop(gate);

        counter!(GAS_READINGS_TOTAL, "tier" => tier.as_str()).increment(1);
        info!(
            value,
            tier = tier.as_str(),
            delivered = report.delivered,
            evicted = report.evicted,
            "gas reading ingested"
        );
        IngestOutcome {
            snapshot,
            tier,
            report,
        }
    }

    /// Current value without side effects.
    pub fn current(&self) -> Snapshot {
        self.cell.load()
    }

    /// Register a subscriber and queue the current value as its first frame.
    pub fn attach(&self, outbound: mpsc::Sender<Frame>) -> Result<SubscriberHandle, BroadcastError> {
        let _gate = self.gate.lock();
        let subscriber = self.broadcaster.subscribe(outbound)?;
        let value = self.cell.load().value;
        match serde_json::to_string(&LiveUpdate { value }) {
            Ok(json) => {
                if let Err(reason) = subscriber.try_send(Frame::from(json)) {
                    // Only a closed queue can fail here; the session will unsubscribe.
                    debug!(subscriber_id = %subscriber.id, reason = reason.as_str(), "initial value not queued");
                }
            }
            Err(e) => debug!(error = %e, "failed to serialize initial value"),
        }
        Ok(subscriber)
    }

    /// Remove a subscriber registered through [`attach`](Self::attach).
    pub fn detach(&self, id: &str) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    /// The underlying broadcaster.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }
}
