//! # domo-store
//!
//! Device (lamp) persistence behind the [`DeviceStore`] trait.
//!
//! [`SqliteDeviceStore`] keeps records in a single `device` table reached
//! through an `r2d2` pool. Blocking `SQLite` calls run on the Tokio blocking
//! pool so request handlers never stall the runtime.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod sqlite;

use async_trait::async_trait;
use domo_core::{Device, DeviceUpdate, NewDevice};

pub use connection::{ConnectionConfig, ConnectionPool, DbLocation, open_pool};
pub use errors::{Result, StoreError};
pub use sqlite::SqliteDeviceStore;

/// Persistent device records keyed by integer id.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Insert a record and return it with its assigned id.
    async fn create(&self, device: NewDevice) -> Result<Device>;

    /// Records ordered by ascending id.
    async fn list(&self, skip: u32, limit: u32) -> Result<Vec<Device>>;

    /// One record, or [`StoreError::NotFound`].
    async fn get(&self, id: i64) -> Result<Device>;

    /// Change status (and optionally name), or [`StoreError::NotFound`].
    async fn update(&self, id: i64, update: DeviceUpdate) -> Result<Device>;

    /// Remove a record, or [`StoreError::NotFound`].
    async fn delete(&self, id: i64) -> Result<()>;

    /// Append a record whose status is the negation of the most recent one
    /// (`true` when the table is empty). The name is carried over.
    async fn toggle_latest(&self) -> Result<Device>;

    /// Cheap liveness probe used by `/health`.
    async fn ping(&self) -> Result<()>;
}
