// src/db/registry.rs

//! SQLite-backed durable registry

use super::{DurableStore, RegistryEntry, paths, schema};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::debug;

/// Durable registry stored in a SQLite database
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
}

impl SqliteRegistry {
    /// Open (creating if necessary) the registry at `path` and migrate it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dir = paths::db_dir(path);
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::IoError(format!("Cannot create {}: {}", dir.display(), e))
            })?;
        }

        debug!("Opening installed-package registry at {}", path.display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory registry
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl DurableStore for SqliteRegistry {
    fn list(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM installed_packages ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    fn read(&self, key: &str) -> Result<Option<RegistryEntry>> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                "SELECT path, detection_info FROM installed_packages WHERE key = ?1",
                [key],
                |row| {
                    Ok(RegistryEntry {
                        path: row.get(0)?,
                        detection_info: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn write(&self, key: &str, entry: &RegistryEntry) -> Result<()> {
        if entry.path.trim().is_empty() {
            return self.remove(key);
        }

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO installed_packages (key, path, detection_info, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET
                path = excluded.path,
                detection_info = excluded.detection_info,
                updated_at = excluded.updated_at",
            params![key, &entry.path, &entry.detection_info],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM installed_packages WHERE key = ?1", [key])?;
        Ok(())
    }
}
