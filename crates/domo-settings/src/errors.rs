//! Settings errors.

use std::path::PathBuf;

/// Failure to produce [`DomoSettings`](crate::DomoSettings).
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not JSON.
    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Merged values do not fit the settings types (e.g. a string port).
    #[error("settings have the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
