// src/db/mod.rs

//! Durable installed-package registry
//!
//! The registry is a flat key-value namespace: one entry per installed
//! package version, keyed by `"<package>-<normalizedVersion>"`, holding the
//! installation path and the detection info. Absence of an entry means
//! "not installed"; writing an entry with an empty path deletes it.

pub mod paths;
mod registry;
pub mod schema;

pub use registry::SqliteRegistry;

use crate::error::Result;

/// Persisted content of one registry entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistryEntry {
    pub path: String,
    pub detection_info: String,
}

impl RegistryEntry {
    pub fn new(path: impl Into<String>, detection_info: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            detection_info: detection_info.into(),
        }
    }
}

/// Hierarchical persisted store surviving process restarts
///
/// Each call is atomic per key; no cross-key transactions are assumed.
pub trait DurableStore: Send + Sync {
    /// All entry keys
    fn list(&self) -> Result<Vec<String>>;

    /// Read one entry
    fn read(&self, key: &str) -> Result<Option<RegistryEntry>>;

    /// Create or overwrite an entry; an empty path removes it instead
    fn write(&self, key: &str, entry: &RegistryEntry) -> Result<()>;

    /// Remove an entry; removing a missing entry is not an error
    fn remove(&self, key: &str) -> Result<()>;
}
