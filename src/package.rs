// src/package.rs

//! Package and package-version definitions
//!
//! These are the metadata objects detection sources describe and the
//! metadata repository stores. They are distinct from installed records:
//! a `PackageVersion` says what a version consists of, an
//! `InstalledPackageVersion` says where it lives on this machine.

use crate::error::{Error, Result};
use crate::filesystem::path::safe_join;
use crate::version::{Dependency, Version};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Manifest entry that removes a package version
pub const UNINSTALL_SCRIPT: &str = ".conary/uninstall.sh";

/// Content of the uninstall script synthesized for detected software
/// that ships no removal procedure
pub const PLACEHOLDER_UNINSTALL: &str =
    "#!/bin/sh\necho no removal procedure for this package is available\nexit 1\n";

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_+]+(?:[.:\-][A-Za-z0-9_+]+)*$").expect("static regex")
});

/// Check a package identity for validity
///
/// Identities are segments of letters, digits, `_` and `+` joined by
/// single `.`, `-` or `:` separators (`org.example.Tool`, `installer:zlib`).
pub fn is_valid_name(name: &str) -> bool {
    PACKAGE_NAME.is_match(name)
}

/// Validate a package identity, returning a `ValidationError` if malformed
pub fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::ValidationError(format!(
            "Invalid package name: '{}'",
            name
        )))
    }
}

/// Identity prefixes that mark packages synthesized from installer
/// records and program listings rather than defined by a repository
pub const SYNTHETIC_PREFIXES: &[&str] = &["installer:", "panel:"];

/// Whether an identity was synthesized by a detection source
pub fn is_synthetic(name: &str) -> bool {
    SYNTHETIC_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// A logical package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: None,
        }
    }
}

/// A file shipped inside a package version's manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersionFile {
    /// Path relative to the installation directory
    pub path: String,
    pub content: String,
}

impl PackageVersionFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// One version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub package: String,
    pub version: Version,
    pub files: Vec<PackageVersionFile>,
    pub dependencies: Vec<Dependency>,
}

impl PackageVersion {
    pub fn new(package: impl Into<String>, version: Version) -> Self {
        Self {
            package: package.into(),
            version,
            files: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Find a manifest file by its relative path
    ///
    /// Separators are compared loosely so `.conary\uninstall.sh` matches
    /// `.conary/uninstall.sh`.
    pub fn find_file(&self, path: &str) -> Option<&PackageVersionFile> {
        let wanted = path.replace('\\', "/");
        self.files
            .iter()
            .find(|f| f.path.replace('\\', "/").eq_ignore_ascii_case(&wanted))
    }

    /// Write every manifest file below `dir`
    pub fn save_files(&self, dir: &Path) -> Result<()> {
        for file in &self.files {
            let target = safe_join(dir, &file.path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::IoError(format!("Cannot create {}: {}", parent.display(), e))
                })?;
            }
            fs::write(&target, &file.content).map_err(|e| {
                Error::IoError(format!("Cannot write {}: {}", target.display(), e))
            })?;
            debug!("Materialized {}", target.display());
        }
        Ok(())
    }
}

/// Package and version definitions produced by one detection source
#[derive(Debug, Clone, Default)]
pub struct MetadataFragment {
    pub packages: Vec<Package>,
    pub versions: Vec<PackageVersion>,
}

impl MetadataFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every package and version whose identity is not in `keep`
    pub fn retain_packages(&mut self, keep: &HashSet<String>) {
        self.packages.retain(|p| keep.contains(&p.name));
        self.versions.retain(|v| keep.contains(&v.package));
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.versions.is_empty()
    }
}
