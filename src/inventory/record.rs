// src/inventory/record.rs

//! Installed package version record

use crate::version::Version;
use std::path::{Path, PathBuf};

/// Canonical string id of a (package, version) pair
///
/// `<package>-<normalizedVersion>`; the same string keys the in-memory
/// store and the durable registry.
pub fn string_id(package: &str, version: &Version) -> String {
    format!("{}-{}", package, version.normalized_string())
}

/// Split a canonical string id at its last `-`
///
/// Returns `None` when there is no separator or the package part is empty.
/// No validation beyond that is done here.
pub fn split_string_id(id: &str) -> Option<(&str, &str)> {
    let pos = id.rfind('-')?;
    if pos == 0 {
        return None;
    }
    Some((&id[..pos], &id[pos + 1..]))
}

/// A package version as found on this machine
///
/// A record is installed iff `directory` is set. Records handed out by
/// [`InventoryStore`](super::InventoryStore) are detached copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackageVersion {
    pub package: String,
    pub version: Version,
    pub directory: Option<PathBuf>,
    /// Free-form note from the detection source (e.g. `installer:{GUID}`)
    pub detection_info: String,
}

impl InstalledPackageVersion {
    pub fn new(package: impl Into<String>, version: Version, directory: Option<PathBuf>) -> Self {
        Self {
            package: package.into(),
            version,
            directory: directory.filter(|d| !d.as_os_str().is_empty()),
            detection_info: String::new(),
        }
    }

    /// Builder-style setter for detection info
    pub fn with_detection_info(mut self, detection_info: impl Into<String>) -> Self {
        self.detection_info = detection_info.into();
        self
    }

    pub fn installed(&self) -> bool {
        self.directory.is_some()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Set or clear the installation directory; an empty path clears it
    pub fn set_path(&mut self, directory: Option<PathBuf>) {
        self.directory = directory.filter(|d| !d.as_os_str().is_empty());
    }

    pub fn string_id(&self) -> String {
        string_id(&self.package, &self.version)
    }
}
