//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when the device store does not answer.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered live subscribers.
    pub subscribers: usize,
    /// `"ok"` or `"unavailable"`.
    pub database: &'static str,
}

/// Summarize server state for `/health`.
pub fn health_check(start_time: Instant, subscribers: usize, database_ok: bool) -> HealthResponse {
    HealthResponse {
        status: if database_ok { "ok" } else { "degraded" },
        uptime_secs: start_time.elapsed().as_secs(),
        subscribers,
        database: if database_ok { "ok" } else { "unavailable" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_store_reports_ok() {
        let resp = health_check(Instant::now(), 0, true);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.database, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn database_down_degrades() {
        let resp = health_check(Instant::now(), 3, false);
        assert_eq!(resp.status, "degraded");
        assert_eq!(resp.database, "unavailable");
        assert_eq!(resp.subscribers, 3);
    }

    #[test]
    fn uptime_counts_from_start() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        assert!(health_check(start, 0, true).uptime_secs >= 59);
    }

    #[test]
    fn body_field_names() {
        let json = serde_json::to_value(health_check(Instant::now(), 2, true)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["subscribers"], 2);
        assert!(json["uptime_secs"].is_number());
    }
}
