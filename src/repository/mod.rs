// src/repository/mod.rs

//! Package metadata repository
//!
//! The repository is where package and package-version definitions live:
//! titles, file manifests, dependencies. The inventory only consumes it
//! through [`MetadataRepository`]; the full package database is a separate
//! component. [`MemoryRepository`] is the in-process implementation used
//! by the scan pipeline and by tests.

use crate::error::Result;
use crate::inventory::InstalledPackageVersion;
use crate::package::{MetadataFragment, Package, PackageVersion, is_synthetic};
use crate::version::Version;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

/// Metadata lookups and updates needed by the inventory
pub trait MetadataRepository: Send + Sync {
    /// Find a package definition by identity
    fn find_package(&self, name: &str) -> Result<Option<Package>>;

    /// Find a package version definition
    fn find_package_version(&self, package: &str, version: &Version)
    -> Result<Option<PackageVersion>>;

    /// Identities of repository-defined (non-synthetic) packages whose
    /// title is exactly `title`
    fn find_better_packages(&self, title: &str) -> Result<Vec<String>>;

    /// Store a source's metadata; with `replace`, existing definitions
    /// with the same identity are overwritten, otherwise they are kept
    fn save_all(&self, fragment: &MetadataFragment, replace: bool) -> Result<()>;

    /// Recompute the derived environment variable from the installed set
    fn update_env_var(&self, installed: &[InstalledPackageVersion]) -> Result<()>;
}

fn version_key(package: &str, version: &Version) -> (String, String) {
    (package.to_string(), version.normalized_string())
}

#[derive(Default)]
struct Contents {
    packages: BTreeMap<String, Package>,
    versions: BTreeMap<(String, String), PackageVersion>,
    env_var: Option<String>,
}

/// Thread-safe in-memory metadata repository
#[derive(Default)]
pub struct MemoryRepository {
    contents: RwLock<Contents>,
    /// Package whose newest installed directory becomes the env var
    env_package: Option<String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the directory of the newest installed version of `package`
    /// through [`MemoryRepository::env_var`]
    pub fn with_env_package(package: impl Into<String>) -> Self {
        Self {
            contents: RwLock::new(Contents::default()),
            env_package: Some(package.into()),
        }
    }

    pub fn add_package(&self, package: Package) {
        self.contents
            .write()
            .packages
            .insert(package.name.clone(), package);
    }

    pub fn add_package_version(&self, version: PackageVersion) {
        let key = version_key(&version.package, &version.version);
        self.contents.write().versions.insert(key, version);
    }

    /// Current value of the derived environment variable
    pub fn env_var(&self) -> Option<String> {
        self.contents.read().env_var.clone()
    }
}

impl MetadataRepository for MemoryRepository {
    fn find_package(&self, name: &str) -> Result<Option<Package>> {
        Ok(self.contents.read().packages.get(name).cloned())
    }

    fn find_package_version(
        &self,
        package: &str,
        version: &Version,
    ) -> Result<Option<PackageVersion>> {
        Ok(self
            .contents
            .read()
            .versions
            .get(&version_key(package, version))
            .cloned())
    }

    fn find_better_packages(&self, title: &str) -> Result<Vec<String>> {
        Ok(self
            .contents
            .read()
            .packages
            .values()
            .filter(|p| p.title == title && !is_synthetic(&p.name))
            .map(|p| p.name.clone())
            .collect())
    }

    fn save_all(&self, fragment: &MetadataFragment, replace: bool) -> Result<()> {
        let mut contents = self.contents.write();

        for package in &fragment.packages {
            if replace || !contents.packages.contains_key(&package.name) {
                contents
                    .packages
                    .insert(package.name.clone(), package.clone());
            }
        }

        for version in &fragment.versions {
            let key = version_key(&version.package, &version.version);
            if replace || !contents.versions.contains_key(&key) {
                contents.versions.insert(key, version.clone());
            }
        }

        debug!(
            "Saved {} packages and {} versions (replace={})",
            fragment.packages.len(),
            fragment.versions.len(),
            replace
        );
        Ok(())
    }

    fn update_env_var(&self, installed: &[InstalledPackageVersion]) -> Result<()> {
        let Some(env_package) = &self.env_package else {
            return Ok(());
        };

        let value = installed
            .iter()
            .filter(|ipv| &ipv.package == env_package)
            .max_by(|a, b| a.version.cmp(&b.version))
            .and_then(|ipv| ipv.directory())
            .map(|d| d.to_string_lossy().into_owned());

        debug!("{} environment variable: {:?}", env_package, value);
        self.contents.write().env_var = value;
        Ok(())
    }
}
