//! Shutdown of the HTTP server and live subscriber sessions.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Server and every session finished.
    Clean,
    /// The deadline passed with `sessions` still running.
    TimedOut {
        /// Sessions still open at the deadline.
        sessions: usize,
    },
}

/// Signals the HTTP server and every subscriber session to stop.
///
/// Sessions close their sockets with 1001 on cancellation. Queued messages
/// are discarded, not drained.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// New coordinator with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wrap a session future so [`drain`](Self::drain) waits for it.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Cancel, then wait up to `timeout` for the server task and all sessions.
    pub async fn drain(&self, server: JoinHandle<()>, timeout: Duration) -> DrainOutcome {
        self.shutdown();
        let _ = self.sessions.close();
        info!(
            sessions = self.sessions.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining"
        );

        let wait = async {
            if let Err(e) = server.await {
                warn!(error = %e, "server task ended abnormally");
            }
            self.sessions.wait().await;
        };

        if tokio::time::timeout(timeout, wait).await.is_ok() {
            info!("shutdown complete");
            DrainOutcome::Clean
        } else {
            let sessions = self.sessions.len();
            warn!(sessions, "shutdown deadline passed with sessions open");
            DrainOutcome::TimedOut { sessions }
        }
    }
}
