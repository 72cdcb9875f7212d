//! Live fan-out to registered subscribers.
//!
//! The subscriber set sits behind one exclusive lock. [`Broadcaster::publish`]
//! holds it for the whole pass, so two publishes never interleave and every
//! subscriber sees them in the same order. Sends never wait: a subscriber
//! whose queue is full or closed is evicted on the spot and the publisher
//! carries on with the rest.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::subscriber::{Frame, Subscriber};
use crate::metrics::{WS_CAPACITY_REJECTIONS_TOTAL, WS_EVICTIONS_TOTAL, WS_SUBSCRIBERS_ACTIVE};

/// Handle returned to a session on successful registration.
pub type SubscriberHandle = Arc<Subscriber>;

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// `max` subscribers are already registered.
    #[error("subscriber limit reached ({max})")]
    AtCapacity {
        /// Configured limit.
        max: usize,
    },
}

/// Outcome of one publish, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that had the frame queued.
    pub delivered: usize,
    /// Subscribers removed during this publish.
    pub evicted: usize,
}

/// Registry of live subscribers with non-blocking fan-out.
pub struct Broadcaster {
    subscribers: Mutex<HashMap<String, SubscriberHandle>>,
    count: AtomicUsize,
    max_subscribers: usize,
}

impl Broadcaster {
    /// Create an empty broadcaster accepting up to `max_subscribers`.
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            count: AtomicUsize::new(0),
            max_subscribers,
        }
    }

    /// Register a subscriber draining `outbound`.
    pub fn subscribe(&self, outbound: mpsc::Sender<Frame>) -> Result<SubscriberHandle, BroadcastError> {
        let mut subs = self.subscribers.lock();
        if subs.len() >= self.max_subscribers {
            counter!(WS_CAPACITY_REJECTIONS_TOTAL).increment(1);
            warn!(max = self.max_subscribers, "subscriber limit reached, rejecting");
            return Err(BroadcastError::AtCapacity {
                max: self.max_subscribers,
            });
        }
        let subscriber = Arc::new(Subscriber::new(outbound));
        let _ = subs.insert(subscriber.id.clone(), subscriber.clone());
        self.sync_count(subs.len());
        info!(subscriber_id = %subscriber.id, subscribers = subs.len(), "subscriber registered");
        Ok(subscriber)
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let mut subs = self.subscribers.lock();
        let removed = subs.remove(id).is_some();
        if removed {
            self.sync_count(subs.len());
            info!(subscriber_id = id, subscribers = subs.len(), "subscriber removed");
        }
        removed
    }

    /// Serialize `message` once and queue it for every subscriber.
    ///
    /// Never fails from the caller's point of view. A message that cannot be
    /// serialized is logged and dropped.
    pub fn publish<T: Serialize>(&self, message: &T) -> PublishReport {
        match serde_json::to_string(message) {
            Ok(json) => self.publish_frame(Frame::from(json)),
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast message");
                PublishReport::default()
            }
        }
    }

    /// Queue an already serialized frame for every subscriber.
    pub fn publish_frame(&self, frame: Frame) -> PublishReport {
        let mut report = PublishReport::default();
        let mut subs = self.subscribers.lock();

        let mut failed = Vec::new();
        for (id, subscriber) in subs.iter() {
            match subscriber.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(reason) => failed.push((id.clone(), reason)),
            }
        }

        for (id, reason) in failed {
            if let Some(subscriber) = subs.remove(&id) {
                subscriber.evict();
                report.evicted += 1;
                counter!(WS_EVICTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
                warn!(subscriber_id = %id, reason = reason.as_str(), "evicting subscriber");
            }
        }

        if report.evicted > 0 {
            self.sync_count(subs.len());
        }
        debug!(
            delivered = report.delivered,
            evicted = report.evicted,
            "broadcast published"
        );
        report
    }

    /// Live subscriber count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether a new subscriber would be rejected right now.
    pub fn is_full(&self) -> bool {
        self.count() >= self.max_subscribers
    }

    /// Cheap pre-check before accepting a connection. [`subscribe`](Self::subscribe)
    /// still enforces the limit under the lock.
    pub fn ensure_capacity(&self) -> Result<(), BroadcastError> {
        if self.is_full() {
            return Err(BroadcastError::AtCapacity {
                max: self.max_subscribers,
            });
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn sync_count(&self, len: usize) {
        self.count.store(len, Ordering::Release);
        gauge!(WS_SUBSCRIBERS_ACTIVE).set(len as f64);
    }
}
