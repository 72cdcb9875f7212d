//! Pooled `SQLite` connections for the device database.

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::debug;

use crate::errors::Result;

/// Pool of device database connections.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Where the device database lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DbLocation {
    /// A file, created on first open.
    File(PathBuf),
    /// A private in-memory database. Gone when the pool drops.
    Memory,
}

/// Pool sizing and lock waiting.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Connections kept for a file database. Memory databases use one.
    pub pool_size: u32,
    /// How long a writer waits on a locked database.
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Applied to every connection the pool hands out.
#[derive(Debug)]
struct DevicePragmas {
    busy_timeout_ms: u32,
    wal: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for DevicePragmas {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_millis(u64::from(self.busy_timeout_ms)))?;
        if self.wal {
            let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        Ok(())
    }
}

/// Build a pool for `location`.
///
/// A memory database exists per connection, so its pool holds exactly one.
pub fn open_pool(location: &DbLocation, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let (manager, size, wal) = match location {
        DbLocation::File(path) => (SqliteConnectionManager::file(path), config.pool_size.max(1), true),
        DbLocation::Memory => (SqliteConnectionManager::memory(), 1, false),
    };
    debug!(?location, size, "opening device database pool");
    let pool = Pool::builder()
        .max_size(size)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(DevicePragmas {
            busy_timeout_ms: config.busy_timeout_ms,
            wal,
        }))
        .build(manager)?;
    Ok(pool)
}

impl From<&Path> for DbLocation {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}
