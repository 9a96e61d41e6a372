// src/inventory/audit.rs

//! Dependency audit of the installed set

use super::record::InstalledPackageVersion;
use super::store::InventoryStore;
use crate::repository::MetadataRepository;
use tracing::{debug, warn};

/// First installed record (in key order) with a dependency that no
/// installed version satisfies
///
/// Records whose definition cannot be looked up are skipped.
pub fn find_first_with_missing_dependency(
    store: &InventoryStore,
    repo: &dyn MetadataRepository,
) -> Option<InstalledPackageVersion> {
    for ipv in store.get_all() {
        let pv = match repo.find_package_version(&ipv.package, &ipv.version) {
            Ok(Some(pv)) => pv,
            Ok(None) => continue,
            Err(e) => {
                warn!("Cannot look up {} {}: {}", ipv.package, ipv.version, e);
                continue;
            }
        };

        if let Some(dep) = pv
            .dependencies
            .iter()
            .find(|dep| !store.is_dependency_installed(dep))
        {
            debug!(
                "{} {} depends on {}, which is not installed",
                ipv.package, ipv.version, dep
            );
            return Some(ipv);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageVersion;
    use crate::repository::MemoryRepository;
    use crate::version::{Dependency, Version};
    use std::path::Path;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn define(repo: &MemoryRepository, package: &str, version: &str, deps: &[(&str, &str)]) {
        let mut pv = PackageVersion::new(package, v(version));
        for (p, c) in deps {
            pv.dependencies.push(Dependency::parse(*p, c).unwrap());
        }
        repo.add_package_version(pv);
    }

    fn install(store: &InventoryStore, package: &str, version: &str) {
        let dir = format!("/opt/{}-{}", package, version);
        store
            .set_path(package, &v(version), Some(Path::new(&dir)), false)
            .unwrap();
    }

    #[test]
    fn test_all_satisfied() {
        let store = InventoryStore::new();
        let repo = MemoryRepository::new();
        define(&repo, "app", "1", &[("lib", "[1, 2)")]);
        define(&repo, "lib", "1.4", &[]);
        install(&store, "app", "1");
        install(&store, "lib", "1.4");

        assert!(find_first_with_missing_dependency(&store, &repo).is_none());
    }

    #[test]
    fn test_finds_unsatisfied() {
        let store = InventoryStore::new();
        let repo = MemoryRepository::new();
        define(&repo, "app", "1", &[("lib", ">= 2")]);
        define(&repo, "lib", "1.4", &[]);
        install(&store, "app", "1");
        install(&store, "lib", "1.4");

        let found = find_first_with_missing_dependency(&store, &repo).unwrap();
        assert_eq!(found.package, "app");
    }

    #[test]
    fn test_stops_at_first_in_key_order() {
        let store = InventoryStore::new();
        let repo = MemoryRepository::new();
        define(&repo, "a", "1", &[("missing", "*")]);
        define(&repo, "b", "1", &[("missing", "*")]);
        install(&store, "b", "1");
        install(&store, "a", "1");

        assert_eq!(find_first_with_missing_dependency(&store, &repo).unwrap().package, "a");
    }

    #[test]
    fn test_unknown_definition_is_skipped() {
        let store = InventoryStore::new();
        let repo = MemoryRepository::new();
        install(&store, "unknown", "1");

        assert!(find_first_with_missing_dependency(&store, &repo).is_none());
    }
}
