//! Live gas subscriptions: registry, per-subscriber state, heartbeat, and
//! the connection task.

pub mod broadcast;
pub mod heartbeat;
pub mod session;
pub mod subscriber;
