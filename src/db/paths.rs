// src/db/paths.rs
//! Centralized path derivation for the registry database

use std::path::{Path, PathBuf};

/// Default location of the installed-package registry
pub const DEFAULT_DB_PATH: &str = "/var/lib/conary/inventory.db";

/// Environment variable overriding the registry location
pub const DB_PATH_ENV: &str = "CONARY_INVENTORY_DB";

/// Get the directory containing the database
pub fn db_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .unwrap_or(Path::new("/var/lib/conary"))
        .to_path_buf()
}

/// Registry location: the environment override if set, else `configured`
pub fn resolve_db_path(configured: &Path) -> PathBuf {
    std::env::var_os(DB_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| configured.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_dir() {
        assert_eq!(
            db_dir(Path::new("/var/lib/conary/inventory.db")),
            PathBuf::from("/var/lib/conary")
        );
    }
}
