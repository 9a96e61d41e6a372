// src/db/schema.rs

//! Schema definitions and migrations for the durable registry
//!
//! Each migration is applied once, in order, and recorded in the
//! `schema_version` table.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current registry schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying registry migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::ConfigError(format!(
            "Unknown registry migration version: {}",
            version
        ))),
    }
}

/// Version 1: one row per installed package version, keyed by its
/// canonical string id
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE installed_packages (
            key TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            detection_info TEXT NOT NULL DEFAULT ''
        );
        ",
    )?;
    Ok(())
}

/// Version 2: track when an entry was last written
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE installed_packages ADD COLUMN updated_at TEXT;
        UPDATE installed_packages SET updated_at = CURRENT_TIMESTAMP;
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM installed_packages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_from_v1_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema_version(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        set_schema_version(&conn, 1).unwrap();
        conn.execute(
            "INSERT INTO installed_packages (key, path) VALUES ('a-1', '/opt/a')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        let updated: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM installed_packages WHERE key = 'a-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(updated.is_some());
    }
}
