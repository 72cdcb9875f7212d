//! # domo-server
//!
//! Axum HTTP + `WebSocket` server for the domo hub.
//!
//! - Gas readings: ingestion over HTTP, classification, live fan-out on `/ws/gas`
//! - Device records: CRUD and toggle over the [`DeviceStore`](domo_store::DeviceStore)
//! - Media: face comparison and voice commands through optional collaborators
//! - Health and Prometheus metrics endpoints
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod gas;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ApiError;
pub use gas::GasMonitor;
pub use server::{AppState, Collaborators, DomoServer};
pub use shutdown::{DrainOutcome, ShutdownCoordinator};
pub use websocket::broadcast::Broadcaster;
