// src/inventory/resolver.rs

//! Path ownership classification for detected installations
//!
//! Detection sources report where they believe a program lives. Those
//! locations are often wrong or shared: installer records point at the
//! program directory itself, several sources report the same program, and
//! the operating system directory contains everything. The resolver
//! decides per candidate whether it becomes an installed record, under
//! which identity and at which directory.

use super::record::InstalledPackageVersion;
use super::store::InventoryStore;
use crate::config::{InventoryConfig, SystemLayout};
use crate::error::{Error, Result};
use crate::filesystem::path::{
    find_non_existing_path, is_under, is_under_or_equals, make_valid_filename, path_equals,
};
use crate::package::{
    PLACEHOLDER_UNINSTALL, PackageVersion, PackageVersionFile, UNINSTALL_SCRIPT, is_synthetic,
};
use crate::repository::MetadataRepository;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of classifying one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Recorded in the store under `package` at `directory`
    Accepted {
        package: String,
        directory: PathBuf,
    },
    /// Its directory lies inside one already claimed by another record
    Discarded,
    /// The same package version was already recorded as installed
    AlreadyInstalled,
}

/// Heuristic classifier for detected installations
#[derive(Debug, Clone)]
pub struct PathResolver {
    layout: SystemLayout,
    os_packages: Vec<String>,
}

impl PathResolver {
    pub fn new(layout: SystemLayout, os_packages: Vec<String>) -> Self {
        Self {
            layout,
            os_packages,
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        Self::new(config.layout.clone(), config.os_packages.clone())
    }

    pub fn layout(&self) -> &SystemLayout {
        &self.layout
    }

    /// Classify `candidate` and record it in `store` when accepted
    ///
    /// `detection_info_prefix` is prepended to the candidate's detection
    /// info unless already present. An `Err` means this candidate was
    /// skipped because of a lookup or I/O failure; the store is untouched
    /// in that case.
    pub fn classify(
        &self,
        store: &InventoryStore,
        repo: &dyn MetadataRepository,
        candidate: &InstalledPackageVersion,
        detection_info_prefix: &str,
    ) -> Result<Classification> {
        let mut directory = candidate
            .directory()
            .filter(|d| d.is_dir())
            .map(Path::to_path_buf);

        if let Some(dir) = &directory
            && self.is_reserved_location(&candidate.package, dir)
        {
            debug!(
                "{} {}: {} is a reserved location",
                candidate.package,
                candidate.version,
                dir.display()
            );
            directory = None;
        }

        let package = self
            .find_better_package_name(repo, &candidate.package)
            .unwrap_or_else(|| candidate.package.clone());

        if let Some(dir) = directory.clone() {
            for claimed in store.get_all_installed_paths() {
                if is_under_or_equals(&dir, &claimed) {
                    debug!(
                        "{} {}: {} is already owned through {}",
                        package,
                        candidate.version,
                        dir.display(),
                        claimed.display()
                    );
                    return Ok(Classification::Discarded);
                }
                if is_under_or_equals(&claimed, &dir) {
                    directory = None;
                    break;
                }
            }
        }

        if store.is_installed(&package, &candidate.version) {
            return Ok(Classification::AlreadyInstalled);
        }

        let mut pv = self.find_package_version(repo, &package, candidate)?;

        if directory.is_none() && pv.find_file(UNINSTALL_SCRIPT).is_none() {
            pv.files
                .push(PackageVersionFile::new(UNINSTALL_SCRIPT, PLACEHOLDER_UNINSTALL));
        }

        let directory = match directory {
            Some(dir) => dir,
            None => self.create_detected_dir(repo, &package, candidate)?,
        };

        if directory.is_dir() {
            pv.save_files(&directory)?;
        }

        let detection_info = if candidate.detection_info.starts_with(detection_info_prefix) {
            candidate.detection_info.clone()
        } else {
            format!("{}{}", detection_info_prefix, candidate.detection_info)
        };

        store.find_or_create(&package, &candidate.version)?;
        store.set_detected(
            &package,
            &candidate.version,
            Some(directory.as_path()),
            &detection_info,
        )?;
        debug!(
            "{} {} detected in {}",
            package,
            candidate.version,
            directory.display()
        );

        Ok(Classification::Accepted {
            package,
            directory,
        })
    }

    /// Whether `dir` must not be claimed by `package`
    fn is_reserved_location(&self, package: &str, dir: &Path) -> bool {
        let layout = &self.layout;

        // ancestor or descendant of the system root
        if is_under(&layout.system_root, dir) || is_under(dir, &layout.system_root) {
            return true;
        }

        if path_equals(dir, &layout.system_root) && !self.os_packages.iter().any(|p| p == package)
        {
            return true;
        }

        if is_under_or_equals(&layout.program_dir, dir) {
            return true;
        }

        if let Some(x86) = &layout.program_dir_x86
            && is_under_or_equals(x86, dir)
        {
            return true;
        }

        false
    }

    /// Canonical identity for a synthetic one: the single repository
    /// package sharing its title
    fn find_better_package_name(&self, repo: &dyn MetadataRepository, package: &str) -> Option<String> {
        if !is_synthetic(package) {
            return None;
        }

        let p = match repo.find_package(package) {
            Ok(Some(p)) => p,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cannot look up {}: {}", package, e);
                return None;
            }
        };

        match repo.find_better_packages(&p.title) {
            Ok(found) if found.len() == 1 => {
                debug!("Replacing {} with {}", package, found[0]);
                found.into_iter().next()
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Cannot search packages titled {:?}: {}", p.title, e);
                None
            }
        }
    }

    /// Version definition for the (possibly renamed) package
    ///
    /// A renamed candidate falls back to the definition its source
    /// produced under the synthetic identity.
    fn find_package_version(
        &self,
        repo: &dyn MetadataRepository,
        package: &str,
        candidate: &InstalledPackageVersion,
    ) -> Result<PackageVersion> {
        if let Some(pv) = repo.find_package_version(package, &candidate.version)? {
            return Ok(pv);
        }

        if package != candidate.package
            && let Some(mut pv) = repo.find_package_version(&candidate.package, &candidate.version)?
        {
            pv.package = package.to_string();
            return Ok(pv);
        }

        Err(Error::NotFoundError(format!(
            "Cannot find the package version {} {}",
            package, candidate.version
        )))
    }

    /// Create a directory below the detected-software subtree for a
    /// candidate whose location is unknown
    fn create_detected_dir(
        &self,
        repo: &dyn MetadataRepository,
        package: &str,
        candidate: &InstalledPackageVersion,
    ) -> Result<PathBuf> {
        let title = match repo.find_package(package)? {
            Some(p) if !p.title.is_empty() => p.title,
            _ => package.to_string(),
        };

        let mut dir = self
            .layout
            .detected_root()
            .join(make_valid_filename(&title, '_'));
        if dir.exists() {
            let mut name = dir.into_os_string();
            name.push(format!("-{}", candidate.version));
            dir = find_non_existing_path(PathBuf::from(name));
        }

        fs::create_dir_all(&dir)
            .map_err(|e| Error::IoError(format!("Cannot create {}: {}", dir.display(), e)))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use crate::repository::MemoryRepository;
    use crate::version::Version;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        resolver: PathResolver,
        store: InventoryStore,
        repo: MemoryRepository,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            for dir in ["system", "programs", "programs-x86"] {
                fs::create_dir_all(root.path().join(dir)).unwrap();
            }
            let layout = SystemLayout {
                system_root: root.path().join("system"),
                program_dir: root.path().join("programs"),
                program_dir_x86: Some(root.path().join("programs-x86")),
                detected_subdir: "Detected".to_string(),
            };
            Self {
                resolver: PathResolver::new(layout, vec!["os.test".to_string()]),
                root,
                store: InventoryStore::new(),
                repo: MemoryRepository::new(),
            }
        }

        fn dir(&self, rel: &str) -> PathBuf {
            let dir = self.root.path().join(rel);
            fs::create_dir_all(&dir).unwrap();
            dir
        }

        /// Register a package with a bare version definition
        fn define(&self, package: &str, title: &str, version: &str) {
            self.repo.add_package(Package::new(package, title));
            self.repo
                .add_package_version(PackageVersion::new(package, v(version)));
        }

        fn classify(&self, package: &str, version: &str, dir: Option<&Path>) -> Result<Classification> {
            let candidate =
                InstalledPackageVersion::new(package, v(version), dir.map(Path::to_path_buf));
            self.resolver
                .classify(&self.store, &self.repo, &candidate, "")
        }
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_accepts_existing_directory() {
        let fx = Fixture::new();
        fx.define("org.example.Tool", "Tool", "1.0");
        let dir = fx.dir("apps/tool");

        let result = fx.classify("org.example.Tool", "1.0", Some(dir.as_path())).unwrap();
        assert_eq!(
            result,
            Classification::Accepted {
                package: "org.example.Tool".to_string(),
                directory: dir.clone(),
            }
        );
        assert_eq!(fx.store.get_path("org.example.Tool", &v("1")), Some(dir.clone()));
        // no placeholder when the location is known
        assert!(!dir.join(UNINSTALL_SCRIPT).exists());
    }

    #[test]
    fn test_program_dir_is_nulled_and_placeholder_written() {
        let fx = Fixture::new();
        fx.define("installer:tool", "Tool", "2.0");
        let program_dir = fx.resolver.layout().program_dir.clone();

        let result = fx.classify("installer:tool", "2.0", Some(program_dir.as_path())).unwrap();

        let expected = fx.resolver.layout().detected_root().join("Tool");
        assert_eq!(
            result,
            Classification::Accepted {
                package: "installer:tool".to_string(),
                directory: expected.clone(),
            }
        );
        let script = fs::read_to_string(expected.join(UNINSTALL_SCRIPT)).unwrap();
        assert_eq!(script, PLACEHOLDER_UNINSTALL);
    }

    #[test]
    fn test_system_root_rules() {
        let fx = Fixture::new();
        fx.define("os.test", "Test OS", "10");
        fx.define("org.example.Tool", "Tool", "1");
        fx.define("org.example.Parent", "Parent", "1");
        let system = fx.resolver.layout().system_root.clone();
        let inside = fx.dir("system/lib/tool");

        assert!(fx.resolver.is_reserved_location("org.example.Tool", &system));
        assert!(!fx.resolver.is_reserved_location("os.test", &system));
        assert!(fx.resolver.is_reserved_location("org.example.Tool", &inside));
        assert!(fx.resolver.is_reserved_location("org.example.Parent", fx.root.path()));

        let result = fx.classify("os.test", "10", Some(system.as_path())).unwrap();
        assert!(matches!(result, Classification::Accepted { directory, .. } if directory == system));
    }

    #[test]
    fn test_x86_program_dir_is_reserved() {
        let fx = Fixture::new();
        let x86 = fx.resolver.layout().program_dir_x86.clone().unwrap();
        assert!(fx.resolver.is_reserved_location("org.example.Tool", &x86));
        assert!(!fx.resolver.is_reserved_location("org.example.Tool", &x86.join("Tool")));
    }

    #[test]
    fn test_missing_directory_becomes_detected_dir() {
        let fx = Fixture::new();
        fx.define("panel:tool", "Tool: Pro", "1.5");
        let gone = fx.root.path().join("gone");

        fx.classify("panel:tool", "1.5", Some(gone.as_path())).unwrap();
        let path = fx.store.get_path("panel:tool", &v("1.5")).unwrap();
        assert_eq!(path, fx.resolver.layout().detected_root().join("Tool_ Pro"));
        assert!(path.is_dir());
    }

    #[test]
    fn test_detected_dir_collision_appends_version() {
        let fx = Fixture::new();
        fx.define("installer:tool", "Tool", "1.0");
        fx.define("panel:tool", "Tool", "2.0");

        fx.classify("installer:tool", "1.0", None).unwrap();
        fx.classify("panel:tool", "2.0", None).unwrap();

        let root = fx.resolver.layout().detected_root();
        assert_eq!(fx.store.get_path("installer:tool", &v("1")), Some(root.join("Tool")));
        assert_eq!(fx.store.get_path("panel:tool", &v("2")), Some(root.join("Tool-2.0")));
    }

    #[test]
    fn test_nested_candidate_is_discarded() {
        let fx = Fixture::new();
        fx.define("org.example.A", "A", "1");
        fx.define("org.example.B", "B", "1");
        let outer = fx.dir("apps/x");
        let inner = fx.dir("apps/x/y");

        fx.classify("org.example.A", "1", Some(outer.as_path())).unwrap();
        let result = fx.classify("org.example.B", "1", Some(inner.as_path())).unwrap();

        assert_eq!(result, Classification::Discarded);
        assert!(fx.store.find("org.example.B", &v("1")).is_none());
    }

    #[test]
    fn test_same_directory_is_discarded() {
        let fx = Fixture::new();
        fx.define("org.example.A", "A", "1");
        fx.define("installer:a", "A setup", "1");
        let dir = fx.dir("apps/a");

        fx.classify("org.example.A", "1", Some(dir.as_path())).unwrap();
        assert_eq!(
            fx.classify("installer:a", "1", Some(dir.as_path())).unwrap(),
            Classification::Discarded
        );
    }

    #[test]
    fn test_ancestor_candidate_loses_directory() {
        let fx = Fixture::new();
        fx.define("org.example.Inner", "Inner", "1");
        fx.define("org.example.Outer", "Outer", "1");
        let inner = fx.dir("apps/x/y");
        let outer = fx.root.path().join("apps/x");

        fx.classify("org.example.Inner", "1", Some(inner.as_path())).unwrap();
        fx.classify("org.example.Outer", "1", Some(outer.as_path())).unwrap();

        let path = fx.store.get_path("org.example.Outer", &v("1")).unwrap();
        assert_eq!(path, fx.resolver.layout().detected_root().join("Outer"));
    }

    #[test]
    fn test_synthetic_identity_is_renamed() {
        let fx = Fixture::new();
        fx.define("org.example.Foo", "Foo", "1.0");
        fx.define("installer:foo", "Foo", "1.0");
        fx.define("panel:foo", "Foo", "1.0");

        let first = fx.classify("installer:foo", "1.0", None).unwrap();
        assert!(
            matches!(&first, Classification::Accepted { package, .. } if package == "org.example.Foo")
        );
        assert_eq!(
            fx.classify("panel:foo", "1.0", None).unwrap(),
            Classification::AlreadyInstalled
        );

        let packages: Vec<_> = fx.store.get_packages().into_iter().collect();
        assert_eq!(packages, vec!["org.example.Foo".to_string()]);
    }

    #[test]
    fn test_rename_uses_synthetic_definition_when_version_unknown() {
        let fx = Fixture::new();
        fx.repo.add_package(Package::new("org.example.Foo", "Foo"));
        fx.define("installer:foo", "Foo", "3.1");

        fx.classify("installer:foo", "3.1", None).unwrap();
        assert!(fx.store.is_installed("org.example.Foo", &v("3.1")));
    }

    #[test]
    fn test_ambiguous_title_is_not_renamed() {
        let fx = Fixture::new();
        fx.repo.add_package(Package::new("org.example.Foo", "Foo"));
        fx.repo.add_package(Package::new("org.other.Foo", "Foo"));
        fx.define("installer:foo", "Foo", "1.0");

        fx.classify("installer:foo", "1.0", None).unwrap();
        assert!(fx.store.is_installed("installer:foo", &v("1.0")));
    }

    #[test]
    fn test_non_synthetic_identity_is_never_renamed() {
        let fx = Fixture::new();
        fx.define("org.example.Foo", "Foo", "1");
        fx.define("org.mirror.Foo", "Foo", "1");

        fx.classify("org.mirror.Foo", "1", None).unwrap();
        assert!(fx.store.is_installed("org.mirror.Foo", &v("1")));
    }

    #[test]
    fn test_already_installed_is_skipped() {
        let fx = Fixture::new();
        fx.define("org.example.Tool", "Tool", "1");
        let first = fx.dir("apps/first");
        let second = fx.dir("apps/second");

        fx.classify("org.example.Tool", "1", Some(first.as_path())).unwrap();
        assert_eq!(
            fx.classify("org.example.Tool", "1", Some(second.as_path())).unwrap(),
            Classification::AlreadyInstalled
        );
        assert_eq!(fx.store.get_path("org.example.Tool", &v("1")), Some(first));
    }

    #[test]
    fn test_missing_definition_skips_candidate() {
        let fx = Fixture::new();
        let dir = fx.dir("apps/unknown");

        let err = fx.classify("org.example.Unknown", "1", Some(dir.as_path())).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
        assert!(fx.store.find("org.example.Unknown", &v("1")).is_none());
    }

    #[test]
    fn test_manifest_is_materialized() {
        let fx = Fixture::new();
        let mut pv = PackageVersion::new("org.example.Tool", v("1"));
        pv.files.push(PackageVersionFile::new(UNINSTALL_SCRIPT, "#!/bin/sh\nrm -rf .\n"));
        fx.repo.add_package(Package::new("org.example.Tool", "Tool"));
        fx.repo.add_package_version(pv);
        let dir = fx.dir("apps/tool");

        fx.classify("org.example.Tool", "1", Some(dir.as_path())).unwrap();
        assert_eq!(
            fs::read_to_string(dir.join(UNINSTALL_SCRIPT)).unwrap(),
            "#!/bin/sh\nrm -rf .\n"
        );
    }

    #[test]
    fn test_detection_info_prefix() {
        let fx = Fixture::new();
        fx.define("installer:tool", "Tool", "1");
        let candidate = InstalledPackageVersion::new("installer:tool", v("1"), None)
            .with_detection_info("rpm");

        fx.resolver
            .classify(&fx.store, &fx.repo, &candidate, "installer:")
            .unwrap();
        let ipv = fx.store.find("installer:tool", &v("1")).unwrap();
        assert_eq!(ipv.detection_info, "installer:rpm");
    }
}
