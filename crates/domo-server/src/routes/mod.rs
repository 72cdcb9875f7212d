//! HTTP route handlers.

pub mod devices;
pub mod gas;
pub mod media;

use serde::Serialize;

/// Standard success body: `{"data": ..., "message": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    /// Payload.
    pub data: T,
    /// Human-readable summary.
    pub message: String,
}

impl<T> Envelope<T> {
    /// Wrap `data` with `message`.
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
        }
    }
}
