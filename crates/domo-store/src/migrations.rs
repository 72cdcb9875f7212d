//! Schema migrations for the device database.
//!
//! The `schema_version` table records applied versions. Each migration runs
//! in its own transaction and already-applied versions are skipped.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "device table",
    sql: "CREATE TABLE IF NOT EXISTS device (
              id     INTEGER PRIMARY KEY AUTOINCREMENT,
              status INTEGER NOT NULL DEFAULT 0,
              name   TEXT    NOT NULL DEFAULT ''
          );",
}];

/// Apply pending migrations. Returns how many were applied.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let _ = conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version    INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL DEFAULT (datetime('now'))
         )",
        [],
    )?;
    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(version = migration.version, "migration already applied, skipping");
            continue;
        }
        apply(conn, migration).map_err(|e| StoreError::Migration {
            message: format!("v{} ({}): {e}", migration.version, migration.description),
        })?;
        info!(
            version = migration.version,
            description = migration.description,
            "applied migration"
        );
        applied += 1;
    }
    Ok(applied)
}

fn apply(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    conn.execute_batch("BEGIN")?;
    let result = conn.execute_batch(migration.sql).and_then(|()| {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map(|_| ())
    });
    match result {
        Ok(()) => conn.execute_batch("COMMIT"),
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}
