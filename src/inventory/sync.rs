// src/inventory/sync.rs

//! Synchronization between the inventory and the durable registry
//!
//! Writes are incremental: [`SyncEngine::save`] compares the live store
//! with what the registry currently holds and only touches entries that
//! differ. A failed write stops the save; earlier writes stay applied.

use super::record::{InstalledPackageVersion, split_string_id};
use super::store::InventoryStore;
use crate::db::{DurableStore, RegistryEntry};
use crate::error::{Error, Result};
use crate::filesystem::path::normalize_path;
use crate::package::is_valid_name;
use crate::version::{Dependency, Version};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Write one record to the durable store: an entry when installed, a
/// removal otherwise
pub(crate) fn save_record(durable: &dyn DurableStore, ipv: &InstalledPackageVersion) -> Result<()> {
    let key = ipv.string_id();
    match ipv.directory() {
        Some(dir) => {
            let path = dir.to_str().ok_or_else(|| {
                Error::ValidationError(format!(
                    "Directory of {} is not valid UTF-8: {}",
                    key,
                    dir.display()
                ))
            })?;
            durable.write(&key, &RegistryEntry::new(path, ipv.detection_info.as_str()))
        }
        None => durable.remove(&key),
    }
}

/// Parse a registry key into a valid (package, version) pair
fn parse_key(key: &str) -> Option<(String, Version)> {
    let (package, version) = split_string_id(key)?;
    if !is_valid_name(package) {
        return None;
    }
    let version = Version::parse(version).ok()?;
    Some((package.to_string(), version))
}

/// Resolve a persisted path to an existing directory
fn existing_dir(path: &str) -> Option<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let dir = PathBuf::from(path);
    dir.is_dir().then(|| normalize_path(dir))
}

/// Reconciles an [`InventoryStore`] with a [`DurableStore`]
pub struct SyncEngine {
    durable: Arc<dyn DurableStore>,
}

impl SyncEngine {
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self { durable }
    }

    pub fn durable(&self) -> &Arc<dyn DurableStore> {
        &self.durable
    }

    /// Replace the content of `store` with the valid entries of the
    /// durable store
    ///
    /// Malformed keys are skipped. Entries whose directory is empty or no
    /// longer exists are removed from the durable store and do not produce
    /// a record. One change notification is fired per loaded record.
    pub fn read_durable_store(&self, store: &InventoryStore) -> Result<()> {
        let mut records = Vec::new();

        for key in self.durable.list()? {
            let Some((package, version)) = parse_key(&key) else {
                debug!("Skipping malformed registry entry {:?}", key);
                continue;
            };

            let entry = match self.durable.read(&key) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Cannot read registry entry {}: {}", key, e);
                    continue;
                }
            };

            match existing_dir(&entry.path) {
                Some(dir) => {
                    records.push(
                        InstalledPackageVersion::new(package, version, Some(dir))
                            .with_detection_info(entry.detection_info),
                    );
                }
                None => {
                    debug!("Removing stale registry entry {} ({:?})", key, entry.path);
                    if let Err(e) = self.durable.remove(&key) {
                        warn!("Cannot remove registry entry {}: {}", key, e);
                    }
                }
            }
        }

        info!("Read {} installed package versions from the registry", records.len());
        store.replace_all(records);
        Ok(())
    }

    /// Read the durable store into a new detached [`InventoryStore`]
    pub fn load(&self) -> Result<InventoryStore> {
        let store = InventoryStore::new();
        self.read_durable_store(&store)?;
        Ok(store)
    }

    /// Persist the differences between `store` and the durable store
    pub fn save(&self, store: &InventoryStore) -> Result<()> {
        let persisted = self.load()?;

        let mut written = 0usize;
        for ipv in store.get_all() {
            if persisted.find(&ipv.package, &ipv.version).as_ref() != Some(&ipv) {
                save_record(self.durable.as_ref(), &ipv)?;
                written += 1;
            }
        }

        let mut removed = 0usize;
        for ipv in persisted.get_all() {
            if !store.is_installed(&ipv.package, &ipv.version) {
                self.durable.remove(&ipv.string_id())?;
                removed += 1;
            }
        }

        info!(
            "Registry synchronized: {} written, {} removed",
            written, removed
        );
        Ok(())
    }

    /// Persist a single record
    pub fn save_record(&self, ipv: &InstalledPackageVersion) -> Result<()> {
        save_record(self.durable.as_ref(), ipv)
    }

    /// Directory of the newest persisted version satisfying `dep`
    ///
    /// Answers straight from the durable store. Entries with a missing
    /// directory are ignored and left in place.
    pub fn find_path(&self, dep: &Dependency) -> Result<Option<PathBuf>> {
        let mut found: Option<(Version, PathBuf)> = None;

        for key in self.durable.list()? {
            let Some((package, version)) = parse_key(&key) else {
                continue;
            };
            if package != dep.package || !dep.test(&version) {
                continue;
            }
            if found.as_ref().is_some_and(|(best, _)| version < *best) {
                continue;
            }

            let Ok(Some(entry)) = self.durable.read(&key) else {
                continue;
            };
            if let Some(dir) = existing_dir(&entry.path) {
                found = Some((version, dir));
            }
        }

        Ok(found.map(|(_, dir)| dir))
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine").finish_non_exhaustive()
    }
}
