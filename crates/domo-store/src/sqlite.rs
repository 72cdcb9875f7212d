//! `SQLite`-backed [`DeviceStore`].

use std::path::Path;

use async_trait::async_trait;
use domo_core::{Device, DeviceUpdate, NewDevice};
use rusqlite::{Connection, OptionalExtension, params};

use crate::connection::{ConnectionConfig, ConnectionPool, DbLocation, open_pool};
use crate::errors::{Result, StoreError};
use crate::migrations;
use crate::DeviceStore;

const COLUMNS: &str = "id, status, name";

/// Device store over an `r2d2` pool of `SQLite` connections.
#[derive(Clone)]
pub struct SqliteDeviceStore {
    pool: ConnectionPool,
}

impl SqliteDeviceStore {
    /// Wrap an existing pool and run migrations.
    pub fn new(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let _ = migrations::run_migrations(&conn)?;
        }
        Ok(Self { pool })
    }

    /// Open (or create) a database file.
    pub fn open(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        Self::new(open_pool(&DbLocation::from(path), config)?)
    }

    /// Fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::new(open_pool(&DbLocation::Memory, &ConnectionConfig::default())?)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        status: row.get(1)?,
        name: row.get(2)?,
    })
}

#[async_trait]
impl DeviceStore for SqliteDeviceStore {
    async fn create(&self, device: NewDevice) -> Result<Device> {
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                &format!("INSERT INTO device (status, name) VALUES (?1, ?2) RETURNING {COLUMNS}"),
                params![device.status, device.name],
                map_row,
            )?)
        })
        .await
    }

    async fn list(&self, skip: u32, limit: u32) -> Result<Vec<Device>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM device ORDER BY id ASC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt
                .query_map(params![limit, skip], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Device> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM device WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn update(&self, id: i64, update: DeviceUpdate) -> Result<Device> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE device SET status = ?1, name = COALESCE(?2, name)
                     WHERE id = ?3 RETURNING {COLUMNS}"
                ),
                params![update.status, update.name, id],
                map_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM device WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn toggle_latest(&self) -> Result<Device> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let latest: Option<(bool, String)> = tx
                .query_row(
                    "SELECT status, name FROM device ORDER BY id DESC LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (status, name) = match latest {
                Some((status, name)) => (!status, name),
                None => (true, String::new()),
            };
            let device = tx.query_row(
                &format!("INSERT INTO device (status, name) VALUES (?1, ?2) RETURNING {COLUMNS}"),
                params![status, name],
                map_row,
            )?;
            tx.commit()?;
            Ok(device)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteDeviceStore {
        SqliteDeviceStore::in_memory().unwrap()
    }

    fn lamp(name: &str, status: bool) -> NewDevice {
        NewDevice {
            status,
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn create_assigns_ids() {
        let s = store();
        let a = s.create(lamp("Salon", true)).await.unwrap();
        let b = s.create(lamp("Cuisine", false)).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(a.name, "Salon");
        assert!(a.status);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let err = store().get(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn list_is_ordered_and_paged() {
        let s = store();
        for i in 0..5 {
            let _ = s.create(lamp(&format!("lamp-{i}"), i % 2 == 0)).await.unwrap();
        }
        let all = s.list(0, 100).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let page = s.list(2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "lamp-2");
    }

    #[tokio::test]
    async fn list_empty() {
        assert!(store().list(0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_status_keeps_name() {
        let s = store();
        let d = s.create(lamp("Chambre", false)).await.unwrap();
        let updated = s
            .update(
                d.id,
                DeviceUpdate {
                    status: true,
                    name: None,
                },
            )
            .await
            .unwrap();
        assert!(updated.status);
        assert_eq!(updated.name, "Chambre");
    }

    #[tokio::test]
    async fn update_can_rename() {
        let s = store();
        let d = s.create(lamp("old", false)).await.unwrap();
        let updated = s
            .update(
                d.id,
                DeviceUpdate {
                    status: false,
                    name: Some("new".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "new");
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let err = store()
            .update(9, DeviceUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_then_get() {
        let s = store();
        let d = s.create(lamp("x", true)).await.unwrap();
        s.delete(d.id).await.unwrap();
        assert!(s.get(d.id).await.unwrap_err().is_not_found());
        assert!(s.delete(d.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn toggle_on_empty_table_starts_on() {
        let d = store().toggle_latest().await.unwrap();
        assert!(d.status);
        assert!(d.name.is_empty());
    }

    #[tokio::test]
    async fn toggle_flips_latest_and_appends() {
        let s = store();
        let first = s.create(lamp("Salon", true)).await.unwrap();
        let toggled = s.toggle_latest().await.unwrap();
        assert!(toggled.id > first.id);
        assert!(!toggled.status);
        assert_eq!(toggled.name, "Salon");

        let again = s.toggle_latest().await.unwrap();
        assert!(again.status);
        assert_eq!(s.list(0, 100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ping_ok() {
        store().ping().await.unwrap();
    }

    #[tokio::test]
    async fn file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.db");
        {
            let s = SqliteDeviceStore::open(&path, &ConnectionConfig::default()).unwrap();
            let _ = s.create(lamp("persisted", true)).await.unwrap();
        }
        let s = SqliteDeviceStore::open(&path, &ConnectionConfig::default()).unwrap();
        let all = s.list(0, 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "persisted");
    }
}
