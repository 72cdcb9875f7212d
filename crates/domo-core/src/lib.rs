//! # domo-core
//!
//! Foundation types shared by every domo crate.
//!
//! - [`reading`]: gas sensor readings, status tiers, and the process-wide
//!   [`ReadingCell`](reading::ReadingCell) holding the current value
//! - [`device`]: lamp/device records exchanged with the device store
//! - [`logging`]: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod device;
pub mod logging;
pub mod reading;

pub use device::{Device, DeviceUpdate, NewDevice};
pub use reading::{ReadingCell, SensorReading, Snapshot, StatusTier};
