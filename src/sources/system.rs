// src/sources/system.rs

//! Installer records of the system package manager
//!
//! Queries the local rpm, dpkg or pacman database through its command-line
//! tool. Each installed package becomes a candidate with the identity
//! `installer:<name>` and no directory; the classifier gives it a location.

use super::{DetectionSource, ScanOutput, SourceKind};
use crate::error::{Error, Result};
use crate::inventory::InstalledPackageVersion;
use crate::job::Job;
use crate::package::is_valid_name;
use crate::version::Version;
use std::process::Command;
use tracing::{debug, info, warn};

/// One row of a package manager's installed list
#[derive(Debug, Clone, PartialEq, Eq)]
struct InstalledEntry {
    name: String,
    version: String,
    summary: String,
}

/// System package manager whose database is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPackageManager {
    Rpm,
    Dpkg,
    Pacman,
}

impl SystemPackageManager {
    /// Query tool of this package manager
    pub fn query_tool(self) -> &'static str {
        match self {
            SystemPackageManager::Rpm => "rpm",
            SystemPackageManager::Dpkg => "dpkg-query",
            SystemPackageManager::Pacman => "pacman",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SystemPackageManager::Rpm => "rpm",
            SystemPackageManager::Dpkg => "dpkg",
            SystemPackageManager::Pacman => "pacman",
        }
    }

    /// Find the first package manager whose query tool is on `PATH`
    pub fn detect() -> Option<Self> {
        [
            SystemPackageManager::Rpm,
            SystemPackageManager::Dpkg,
            SystemPackageManager::Pacman,
        ]
        .into_iter()
        .find(|pm| which::which(pm.query_tool()).is_ok())
    }

    fn query_args(self) -> &'static [&'static str] {
        match self {
            SystemPackageManager::Rpm => {
                &["-qa", "--queryformat", "%{NAME}|%{VERSION}|%{SUMMARY}\n"]
            }
            SystemPackageManager::Dpkg => &[
                "-W",
                "-f",
                "${db:Status-Abbrev}|${Package}|${Version}|${binary:Summary}\n",
            ],
            SystemPackageManager::Pacman => &["-Q"],
        }
    }

    /// List installed packages
    fn list_installed(self) -> Result<Vec<InstalledEntry>> {
        debug!("Querying installed {} packages", self.as_str());

        let output = Command::new(self.query_tool())
            .args(self.query_args())
            .output()
            .map_err(|e| Error::ScanError(format!("Failed to run {}: {}", self.query_tool(), e)))?;

        if !output.status.success() {
            return Err(Error::ScanError(format!(
                "{} failed: {}",
                self.query_tool(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(self.parse_output(&stdout))
    }

    fn parse_output(self, stdout: &str) -> Vec<InstalledEntry> {
        match self {
            SystemPackageManager::Rpm => parse_rpm_output(stdout),
            SystemPackageManager::Dpkg => parse_dpkg_output(stdout),
            SystemPackageManager::Pacman => parse_pacman_output(stdout),
        }
    }
}

/// `NAME|VERSION|SUMMARY` lines
fn parse_rpm_output(stdout: &str) -> Vec<InstalledEntry> {
    let mut entries = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.splitn(3, '|').collect();
        if parts.len() < 2 {
            warn!("Skipping malformed rpm output line: {}", line);
            continue;
        }
        entries.push(InstalledEntry {
            name: parts[0].trim().to_string(),
            version: parts[1].trim().to_string(),
            summary: parts.get(2).map(|s| s.trim().to_string()).unwrap_or_default(),
        });
    }
    entries
}

/// `STATUS|PACKAGE|VERSION|SUMMARY` lines; only fully installed (`ii`)
/// packages are kept
fn parse_dpkg_output(stdout: &str) -> Vec<InstalledEntry> {
    let mut entries = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.splitn(4, '|').collect();
        if parts.len() < 3 {
            warn!("Skipping malformed dpkg-query output line: {}", line);
            continue;
        }
        if !parts[0].starts_with("ii") {
            continue;
        }
        entries.push(InstalledEntry {
            name: parts[1].trim().to_string(),
            version: parts[2].trim().to_string(),
            summary: parts.get(3).map(|s| s.trim().to_string()).unwrap_or_default(),
        });
    }
    entries
}

/// `name version` lines
fn parse_pacman_output(stdout: &str) -> Vec<InstalledEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let (name, version) = line.trim().split_once(' ')?;
            Some(InstalledEntry {
                name: name.to_string(),
                version: version.trim().to_string(),
                summary: String::new(),
            })
        })
        .collect()
}

/// Detection source over the system package manager's records
pub struct SystemPackagesSource {
    manager: Option<SystemPackageManager>,
}

impl SystemPackagesSource {
    /// Use whichever package manager is available
    pub fn new() -> Self {
        Self {
            manager: SystemPackageManager::detect(),
        }
    }

    /// Use a specific package manager, or none at all
    pub fn with_manager(manager: Option<SystemPackageManager>) -> Self {
        Self { manager }
    }

    fn collect(manager: SystemPackageManager, entries: Vec<InstalledEntry>, job: &Job) -> ScanOutput {
        let mut out = ScanOutput::new();
        let total = entries.len().max(1) as f64;

        for (i, entry) in entries.into_iter().enumerate() {
            let package = format!("installer:{}", entry.name);
            if is_valid_name(&package) {
                let candidate = InstalledPackageVersion::new(
                    package,
                    Version::parse_lenient(&entry.version),
                    None,
                )
                .with_detection_info(format!("{}:{}", manager.as_str(), entry.name));
                out.push(candidate, &entry.name, &entry.summary);
            } else {
                debug!(
                    "Skipping {} package with unusable name {:?}",
                    manager.as_str(),
                    entry.name
                );
            }
            job.set_progress((i + 1) as f64 / total);
        }
        out
    }
}

impl Default for SystemPackagesSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionSource for SystemPackagesSource {
    fn kind(&self) -> SourceKind {
        SourceKind::InstallerRecords
    }

    fn scan(&self, job: &Job) -> Result<ScanOutput> {
        let Some(manager) = self.manager else {
            debug!("No system package manager found");
            job.set_progress(1.0);
            return Ok(ScanOutput::new());
        };

        let entries = manager.list_installed()?;
        info!("{} lists {} installed packages", manager.as_str(), entries.len());
        Ok(Self::collect(manager, entries, job))
    }
}
