// src/sources/wellknown.rs

//! Programs known without scanning: this tool and the operating system

use super::{DetectionSource, ScanOutput, SourceKind};
use crate::config::InventoryConfig;
use crate::error::Result;
use crate::inventory::InstalledPackageVersion;
use crate::job::Job;
use crate::version::Version;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

const OS_RELEASE: &str = "/etc/os-release";

/// Parse `os-release(5)` content into key/value pairs
///
/// Values may be quoted with single or double quotes; comments and
/// malformed lines are ignored.
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

pub struct WellKnownSource {
    self_package: String,
    os_package: Option<String>,
    system_root: PathBuf,
    os_release: PathBuf,
}

impl WellKnownSource {
    pub fn new(config: &InventoryConfig) -> Self {
        Self {
            self_package: config.self_package.clone(),
            os_package: config.os_packages.first().cloned(),
            system_root: config.layout.system_root.clone(),
            os_release: PathBuf::from(OS_RELEASE),
        }
    }

    /// Read the operating system version from another file
    pub fn with_os_release(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release = path.into();
        self
    }

    fn detect_self(&self, out: &mut ScanOutput) {
        let version = Version::parse_lenient(env!("CARGO_PKG_VERSION"));
        let dir = match std::env::current_exe() {
            Ok(exe) => exe.parent().map(|p| p.to_path_buf()),
            Err(e) => {
                warn!("Cannot determine the running executable: {}", e);
                None
            }
        };

        out.push(
            InstalledPackageVersion::new(self.self_package.as_str(), version, dir),
            "Conary",
            "Package manager",
        );
    }

    fn detect_os(&self, out: &mut ScanOutput) {
        let Some(package) = &self.os_package else {
            return;
        };

        let content = match std::fs::read_to_string(&self.os_release) {
            Ok(content) => content,
            Err(e) => {
                debug!("Cannot read {}: {}", self.os_release.display(), e);
                return;
            }
        };

        let fields = parse_os_release(&content);
        let Some(version_id) = fields.get("VERSION_ID") else {
            debug!("{} has no VERSION_ID", self.os_release.display());
            return;
        };
        let title = fields
            .get("NAME")
            .cloned()
            .unwrap_or_else(|| "Operating system".to_string());

        out.push(
            InstalledPackageVersion::new(
                package.as_str(),
                Version::parse_lenient(version_id),
                Some(self.system_root.clone()),
            ),
            &title,
            fields.get("PRETTY_NAME").map(String::as_str).unwrap_or(""),
        );
    }
}

impl DetectionSource for WellKnownSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WellKnown
    }

    fn scan(&self, job: &Job) -> Result<ScanOutput> {
        let mut out = ScanOutput::new();
        self.detect_self(&mut out);
        job.set_progress(0.5);
        self.detect_os(&mut out);
        job.set_progress(1.0);
        Ok(out)
    }
}
