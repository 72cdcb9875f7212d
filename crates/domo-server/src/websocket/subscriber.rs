//! Live subscriber state shared by the broadcaster and its session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// One serialized text frame. Cloning shares the buffer.
pub type Frame = Utf8Bytes;

/// Why a frame could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The outbound queue is at capacity.
    Full,
    /// The session's writer has gone away.
    Closed,
}

impl SendFailure {
    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "queue_full",
            Self::Closed => "closed",
        }
    }
}

/// A registered live subscriber.
///
/// Frames go into a bounded FIFO drained by exactly one writer task, so
/// per-subscriber delivery order equals enqueue order.
pub struct Subscriber {
    /// Unique subscriber ID (UUID v7).
    pub id: String,
    tx: mpsc::Sender<Frame>,
    evicted: CancellationToken,
    /// When this subscriber registered.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
}

impl Subscriber {
    /// Create a subscriber with a fresh ID around an outbound queue.
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        let now = Instant::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            tx,
            evicted: CancellationToken::new(),
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
        }
    }

    /// Queue a frame without waiting.
    pub fn try_send(&self, frame: Frame) -> Result<(), SendFailure> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::Full,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Signal the session that this subscriber was dropped by the broadcaster.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    /// Whether [`evict`](Self::evict) has been called.
    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Token cancelled on eviction.
    pub fn eviction_token(&self) -> CancellationToken {
        self.evicted.clone()
    }

    /// Record inbound activity (any frame, including pongs).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if there was activity since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity (or registration).
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
