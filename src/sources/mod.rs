// src/sources/mod.rs

//! Detection sources
//!
//! Each source scans one system of record and reports what it believes is
//! installed: a list of candidate records plus the package and version
//! definitions describing them. Sources never touch the inventory; the
//! scan orchestrator runs them concurrently and folds their output in
//! afterwards.

mod desktop;
mod prior;
mod system;
mod wellknown;

pub use desktop::{DesktopEntry, DesktopEntrySource, parse_desktop_entry};
pub use prior::PriorInstallsSource;
pub use system::{SystemPackageManager, SystemPackagesSource};
pub use wellknown::{WellKnownSource, parse_os_release};

use crate::error::Result;
use crate::inventory::InstalledPackageVersion;
use crate::job::Job;
use crate::package::{MetadataFragment, Package, PackageVersion};
use std::fmt;

/// Category of a detection source
///
/// The declaration order is the merge priority: earlier kinds are folded
/// into the inventory first and win conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// Packages this tool installed itself
    PriorInstalls,
    /// Programs known without scanning (this tool, the operating system)
    WellKnown,
    /// Records of the system package installer
    InstallerRecords,
    /// Program listings of the desktop environment
    ProgramListings,
}

impl SourceKind {
    /// All kinds in priority order
    pub const ALL: [SourceKind; 4] = [
        SourceKind::PriorInstalls,
        SourceKind::WellKnown,
        SourceKind::InstallerRecords,
        SourceKind::ProgramListings,
    ];

    /// Prefix of the detection info recorded for candidates of this kind
    pub fn detection_info_prefix(self) -> &'static str {
        match self {
            SourceKind::PriorInstalls | SourceKind::WellKnown => "",
            SourceKind::InstallerRecords => "installer:",
            SourceKind::ProgramListings => "panel:",
        }
    }

    /// Whether this source's definitions overwrite existing ones on merge
    pub fn replaces_metadata(self) -> bool {
        matches!(
            self,
            SourceKind::InstallerRecords | SourceKind::ProgramListings
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::PriorInstalls => "prior installations",
            SourceKind::WellKnown => "well-known programs",
            SourceKind::InstallerRecords => "installer records",
            SourceKind::ProgramListings => "program listings",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Private output of one source's scan
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub candidates: Vec<InstalledPackageVersion>,
    pub metadata: MetadataFragment,
}

impl ScanOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate together with bare package and version definitions
    ///
    /// A package already described in this output keeps its first
    /// definition.
    pub fn push(&mut self, candidate: InstalledPackageVersion, title: &str, description: &str) {
        if !self
            .metadata
            .packages
            .iter()
            .any(|p| p.name == candidate.package)
        {
            let mut package = Package::new(candidate.package.as_str(), title);
            package.description = Some(description.to_string()).filter(|d| !d.is_empty());
            self.metadata.packages.push(package);
        }

        if !self
            .metadata
            .versions
            .iter()
            .any(|pv| pv.package == candidate.package && pv.version == candidate.version)
        {
            self.metadata.versions.push(PackageVersion::new(
                candidate.package.as_str(),
                candidate.version.clone(),
            ));
        }

        self.candidates.push(candidate);
    }
}

/// Producer of candidate records for one system of record
///
/// `scan` is called from a worker thread concurrently with the other
/// sources and must only touch its own state.
pub trait DetectionSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Scan the system of record, reporting progress through `job`
    fn scan(&self, job: &Job) -> Result<ScanOutput>;
}
