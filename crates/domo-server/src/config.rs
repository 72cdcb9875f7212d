//! Server configuration.

use std::time::Duration;

use domo_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the domo server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrently registered live subscribers.
    pub max_subscribers: usize,
    /// Per-subscriber outbound queue depth.
    pub send_buffer: usize,
    /// Per-message socket write timeout in milliseconds.
    pub send_timeout_ms: u64,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a subscriber silent for this long, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Max request body for multipart uploads in bytes.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Socket write timeout.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Interval between server pings, at least 1ms.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// Silence tolerated before a subscriber is dropped.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_subscribers: 1024,
            send_buffer: 64,
            send_timeout_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 64 * 1024,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_subscribers: s.max_subscribers,
            send_buffer: s.send_buffer.max(1),
            send_timeout_ms: s.send_timeout_ms,
            heartbeat_interval_ms: s.heartbeat_interval_ms,
            heartbeat_timeout_ms: s.heartbeat_timeout_ms,
            max_message_size: s.max_message_size,
            max_upload_bytes: s.max_upload_bytes,
        }
    }
}
