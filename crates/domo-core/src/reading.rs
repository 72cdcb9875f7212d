//! Gas sensor readings and the current-value cell.
//!
//! Every ingestion produces a [`SensorReading`] that supersedes the previous
//! one. Only the latest reading is kept, inside a [`ReadingCell`] that starts
//! at the sentinel value `0` before any producer has reported.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Readings strictly below this value are [`StatusTier::Normal`].
pub const ATTENTION_THRESHOLD: i64 = 200;
/// Readings at or above this value are [`StatusTier::Danger`].
pub const DANGER_THRESHOLD: i64 = 300;

/// Sentinel value reported before the first ingestion.
pub const SENTINEL_VALUE: i64 = 0;

/// Classification label derived from a reading's raw value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusTier {
    /// `value < 200`.
    Normal,
    /// `200 <= value < 300`.
    Attention,
    /// `value >= 300`.
    Danger,
}

impl StatusTier {
    /// Classify a raw sensor value.
    ///
    /// Thresholds are inclusive on the lower bound: 199 is `Normal`,
    /// 200 is `Attention`, 300 is `Danger`. Out-of-range values (negative,
    /// huge) are classified, never rejected.
    pub fn classify(value: i64) -> Self {
        if value < ATTENTION_THRESHOLD {
            Self::Normal
        } else if value < DANGER_THRESHOLD {
            Self::Attention
        } else {
            Self::Danger
        }
    }

    /// Human-facing label returned to producers and status queries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Attention => "Attention",
            Self::Danger => "Danger",
        }
    }
}

impl fmt::Display for StatusTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested sensor value with its arrival time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorReading {
    /// Raw integer value as sent by the producer. No unit conversion.
    pub value: i64,
    /// When the hub received the reading.
    pub received_at: DateTime<Utc>,
}

impl SensorReading {
    /// Reading stamped with the current time.
    pub fn now(value: i64) -> Self {
        Self {
            value,
            received_at: Utc::now(),
        }
    }

    /// Status tier of this reading.
    pub fn tier(&self) -> StatusTier {
        StatusTier::classify(self.value)
    }
}

/// Consistent view of the current value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Latest value, or [`SENTINEL_VALUE`] before any ingestion.
    pub value: i64,
    /// Arrival time of the latest value, `None` before any ingestion.
    #[serde(rename = "timestamp")]
    pub received_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// The "no data yet" snapshot.
    pub const fn sentinel() -> Self {
        Self {
            value: SENTINEL_VALUE,
            received_at: None,
        }
    }

    /// Status tier of the held value.
    pub fn tier(&self) -> StatusTier {
        StatusTier::classify(self.value)
    }

    /// Whether any reading has been ingested yet.
    pub fn has_data(&self) -> bool {
        self.received_at.is_some()
    }
}

impl From<SensorReading> for Snapshot {
    fn from(reading: SensorReading) -> Self {
        Self {
            value: reading.value,
            received_at: Some(reading.received_at),
        }
    }
}

/// Process-wide cell holding the most recent reading.
///
/// Writes replace the whole snapshot under an exclusive lock, so readers
/// never observe a value paired with another reading's timestamp.
#[derive(Debug)]
pub struct ReadingCell {
    current: RwLock<Snapshot>,
}

impl ReadingCell {
    /// Create a cell holding the sentinel snapshot.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Snapshot::sentinel()),
        }
    }

    /// Replace the current value, returning the new snapshot.
    pub fn store(&self, reading: SensorReading) -> Snapshot {
        let snapshot = Snapshot::from(reading);
        *self.current.write() = snapshot;
        snapshot
    }

    /// Read the current value.
    pub fn load(&self) -> Snapshot {
        *self.current.read()
    }
}

impl Default for ReadingCell {
    fn default() -> Self {
        Self::new()
    }
}
