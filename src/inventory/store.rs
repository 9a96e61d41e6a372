// src/inventory/store.rs

//! Thread-safe in-memory inventory of installed package versions
//!
//! All reads and writes go through one mutex held for the duration of a
//! single operation. Every accessor returns detached copies, so callers
//! never hold the lock and never observe a half-applied mutation.

use super::record::{InstalledPackageVersion, string_id};
use super::sync;
use crate::db::DurableStore;
use crate::error::{Error, Result};
use crate::filesystem::path::{depth, is_under_or_equals};
use crate::package::validate_name;
use crate::version::{Dependency, Version};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use tracing::debug;

/// Notification that the installation state of a package version changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub package: String,
    pub version: Version,
}

/// Process-wide record of installed package versions
///
/// Construct one at startup and pass it down; tests and the sync engine
/// create independent short-lived instances freely.
#[derive(Default)]
pub struct InventoryStore {
    /// Keyed by canonical string id; BTreeMap gives a stable iteration order
    data: Mutex<BTreeMap<String, InstalledPackageVersion>>,
    durable: Option<Arc<dyn DurableStore>>,
    listeners: Mutex<Vec<Sender<StatusChange>>>,
}

impl InventoryStore {
    /// Create an empty store without durable backing
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that can persist through `durable`
    pub fn with_durable(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            durable: Some(durable),
            ..Self::default()
        }
    }

    /// The durable store this inventory persists to, if any
    pub fn durable(&self) -> Option<&Arc<dyn DurableStore>> {
        self.durable.as_ref()
    }

    /// Receive a [`StatusChange`] after every path-affecting mutation
    ///
    /// Delivery never blocks the mutating call. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> Receiver<StatusChange> {
        let (tx, rx) = channel();
        self.listeners.lock().push(tx);
        rx
    }

    fn fire_status_changed(&self, package: &str, version: &Version) {
        let change = StatusChange {
            package: package.to_string(),
            version: version.clone(),
        };
        self.listeners
            .lock()
            .retain(|tx| tx.send(change.clone()).is_ok());
    }

    /// Find a record (installed or placeholder)
    pub fn find(&self, package: &str, version: &Version) -> Option<InstalledPackageVersion> {
        self.data.lock().get(&string_id(package, version)).cloned()
    }

    /// Return the record for (package, version), creating a placeholder
    /// with no directory if absent
    pub fn find_or_create(
        &self,
        package: &str,
        version: &Version,
    ) -> Result<InstalledPackageVersion> {
        validate_name(package)?;

        let mut data = self.data.lock();
        let ipv = data
            .entry(string_id(package, version))
            .or_insert_with(|| InstalledPackageVersion::new(package, version.clone(), None));
        Ok(ipv.clone())
    }

    /// Update or insert a record's directory
    ///
    /// With `persist`, the record is also written to the durable store. A
    /// persistence failure is returned, but the in-memory change stays.
    pub fn set_path(
        &self,
        package: &str,
        version: &Version,
        directory: Option<&Path>,
        persist: bool,
    ) -> Result<()> {
        validate_name(package)?;
        let result = {
            let mut data = self.data.lock();
            let ipv = data
                .entry(string_id(package, version))
                .or_insert_with(|| InstalledPackageVersion::new(package, version.clone(), None));
            ipv.set_path(directory.map(Path::to_path_buf));

            if persist {
                match &self.durable {
                    Some(durable) => sync::save_record(durable.as_ref(), ipv),
                    None => Err(Error::ConfigError(
                        "Inventory has no durable store attached".to_string(),
                    )),
                }
            } else {
                Ok(())
            }
        };

        self.fire_status_changed(package, version);
        result
    }

    /// Set directory and detection info of a record in one step,
    /// creating it if necessary; nothing is persisted
    pub fn set_detected(
        &self,
        package: &str,
        version: &Version,
        directory: Option<&Path>,
        detection_info: &str,
    ) -> Result<()> {
        validate_name(package)?;
        {
            let mut data = self.data.lock();
            let ipv = data
                .entry(string_id(package, version))
                .or_insert_with(|| InstalledPackageVersion::new(package, version.clone(), None));
            ipv.detection_info = detection_info.to_string();
            ipv.set_path(directory.map(Path::to_path_buf));
        }
        self.fire_status_changed(package, version);
        Ok(())
    }

    /// Directory of a record, if it is installed
    pub fn get_path(&self, package: &str, version: &Version) -> Option<PathBuf> {
        self.data
            .lock()
            .get(&string_id(package, version))
            .and_then(|ipv| ipv.directory.clone())
    }

    /// All installed records
    pub fn get_all(&self) -> Vec<InstalledPackageVersion> {
        self.data
            .lock()
            .values()
            .filter(|ipv| ipv.installed())
            .cloned()
            .collect()
    }

    /// Installed records of one package
    pub fn get_by_package(&self, package: &str) -> Vec<InstalledPackageVersion> {
        self.data
            .lock()
            .values()
            .filter(|ipv| ipv.installed() && ipv.package == package)
            .cloned()
            .collect()
    }

    /// Installed record of `package` with the highest version
    ///
    /// Among equal versions the first in key order wins.
    pub fn get_newest_installed(&self, package: &str) -> Option<InstalledPackageVersion> {
        let data = self.data.lock();
        let mut newest: Option<&InstalledPackageVersion> = None;
        for ipv in data.values() {
            if ipv.package == package
                && ipv.installed()
                && newest.is_none_or(|n| n.version < ipv.version)
            {
                newest = Some(ipv);
            }
        }
        newest.cloned()
    }

    /// Identities having at least one installed version
    pub fn get_packages(&self) -> BTreeSet<String> {
        self.data
            .lock()
            .values()
            .filter(|ipv| ipv.installed())
            .map(|ipv| ipv.package.clone())
            .collect()
    }

    /// Directories of all installed records
    pub fn get_all_installed_paths(&self) -> Vec<PathBuf> {
        self.data
            .lock()
            .values()
            .filter_map(|ipv| ipv.directory.clone())
            .collect()
    }

    /// Installed record owning `path`
    ///
    /// A record owns a path if its directory equals it or is an ancestor
    /// of it. When several records qualify the deepest directory wins;
    /// equal depths fall back to key order.
    pub fn find_owner(&self, path: &Path) -> Option<InstalledPackageVersion> {
        let data = self.data.lock();
        let mut best: Option<(&InstalledPackageVersion, usize)> = None;
        for ipv in data.values() {
            let Some(dir) = ipv.directory() else {
                continue;
            };
            if !is_under_or_equals(path, dir) {
                continue;
            }
            let d = depth(dir);
            if best.is_none_or(|(_, best_depth)| d > best_depth) {
                best = Some((ipv, d));
            }
        }
        best.map(|(ipv, _)| ipv.clone())
    }

    pub fn is_installed(&self, package: &str, version: &Version) -> bool {
        self.data
            .lock()
            .get(&string_id(package, version))
            .is_some_and(|ipv| ipv.installed())
    }

    /// Whether some installed version of `dep.package` satisfies `dep`
    pub fn is_dependency_installed(&self, dep: &Dependency) -> bool {
        self.data
            .lock()
            .values()
            .any(|ipv| ipv.installed() && ipv.package == dep.package && dep.test(&ipv.version))
    }

    /// Number of installed records
    pub fn len(&self) -> usize {
        self.data.lock().values().filter(|ipv| ipv.installed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record
    pub fn clear(&self) {
        self.data.lock().clear();
        debug!("Inventory cleared");
    }

    /// Replace the whole content with `records`, firing one notification
    /// per record once the new content is in place
    pub fn replace_all(&self, records: Vec<InstalledPackageVersion>) {
        {
            let mut data = self.data.lock();
            data.clear();
            for ipv in &records {
                data.insert(ipv.string_id(), ipv.clone());
            }
        }

        for ipv in &records {
            self.fire_status_changed(&ipv.package, &ipv.version);
        }
    }

    /// Independent copy of the installed records, without durable backing
    /// or subscribers
    pub fn snapshot(&self) -> InventoryStore {
        let copy = InventoryStore::new();
        {
            let mut data = copy.data.lock();
            for ipv in self.get_all() {
                data.insert(ipv.string_id(), ipv);
            }
        }
        copy
    }
}

impl std::fmt::Debug for InventoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryStore")
            .field("records", &self.data.lock().len())
            .field("durable", &self.durable.is_some())
            .finish()
    }
}
