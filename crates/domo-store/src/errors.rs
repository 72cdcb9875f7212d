//! Store error types.

use thiserror::Error;

/// Errors returned by [`DeviceStore`](crate::DeviceStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id.
    #[error("device not found: {0}")]
    NotFound(i64),

    /// `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Which migration failed and why.
        message: String,
    },

    /// The blocking task running the query panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Whether this is a missing-record error rather than a backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = StoreError::NotFound(7);
        assert_eq!(err.to_string(), "device not found: 7");
        assert!(err.is_not_found());
    }

    #[test]
    fn sqlite_error_is_backend_failure() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn migration_display() {
        let err = StoreError::Migration {
            message: "v1 failed".into(),
        };
        assert_eq!(err.to_string(), "migration error: v1 failed");
    }
}
