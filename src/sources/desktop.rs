// src/sources/desktop.rs

//! Program listings from freedesktop `.desktop` entries
//!
//! Every application entry under the configured directories is reported
//! as `panel:<file stem>`. Entries rarely carry a version or a directory;
//! `X-AppVersion=` and `Path=` are used when present.

use super::{DetectionSource, ScanOutput, SourceKind};
use crate::error::Result;
use crate::inventory::InstalledPackageVersion;
use crate::job::Job;
use crate::package::is_valid_name;
use crate::version::Version;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Fields of a `[Desktop Entry]` group relevant to detection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    pub name: String,
    pub comment: String,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub entry_type: String,
    pub no_display: bool,
    pub hidden: bool,
}

impl DesktopEntry {
    /// Whether this entry describes a visible application
    pub fn is_listed_application(&self) -> bool {
        self.entry_type == "Application" && !self.no_display && !self.hidden && !self.name.is_empty()
    }
}

/// Parse the `[Desktop Entry]` group of a desktop file
///
/// Localized keys (`Name[de]=`) and other groups are ignored. Returns
/// `None` if the group is missing.
pub fn parse_desktop_entry(content: &str) -> Option<DesktopEntry> {
    let mut entry = DesktopEntry::default();
    let mut in_group = false;
    let mut seen_group = false;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_group = line == "[Desktop Entry]";
            seen_group |= in_group;
            continue;
        }
        if !in_group {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => entry.name = value.to_string(),
            "Comment" => entry.comment = value.to_string(),
            "Type" => entry.entry_type = value.to_string(),
            "X-AppVersion" if !value.is_empty() => entry.version = Some(value.to_string()),
            "Path" if !value.is_empty() => entry.path = Some(PathBuf::from(value)),
            "NoDisplay" => entry.no_display = value.eq_ignore_ascii_case("true"),
            "Hidden" => entry.hidden = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    seen_group.then_some(entry)
}

pub struct DesktopEntrySource {
    dirs: Vec<PathBuf>,
}

impl DesktopEntrySource {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn desktop_files(dir: &Path) -> Vec<PathBuf> {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                debug!("Skipping {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "desktop"))
            .collect();
        files.sort();
        files
    }

    fn scan_file(path: &Path, out: &mut ScanOutput) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        let package = format!("panel:{}", stem);
        if !is_valid_name(&package) {
            debug!("Skipping {}: unusable file name", path.display());
            return;
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                return;
            }
        };

        let Some(entry) = parse_desktop_entry(&content) else {
            debug!("{} has no [Desktop Entry] group", path.display());
            return;
        };
        if !entry.is_listed_application() {
            return;
        }

        let version = entry
            .version
            .as_deref()
            .map(Version::parse_lenient)
            .unwrap_or_else(|| Version::new(&[1]));
        let candidate = InstalledPackageVersion::new(package, version, entry.path.clone())
            .with_detection_info(stem);
        out.push(candidate, &entry.name, &entry.comment);
    }
}

impl DetectionSource for DesktopEntrySource {
    fn kind(&self) -> SourceKind {
        SourceKind::ProgramListings
    }

    fn scan(&self, job: &Job) -> Result<ScanOutput> {
        let mut out = ScanOutput::new();
        let files: Vec<PathBuf> = self
            .dirs
            .iter()
            .flat_map(|dir| Self::desktop_files(dir))
            .collect();
        let total = files.len().max(1) as f64;

        for (i, path) in files.iter().enumerate() {
            Self::scan_file(path, &mut out);
            job.set_progress((i + 1) as f64 / total);
        }

        debug!("{} listed applications", out.candidates.len());
        job.set_progress(1.0);
        Ok(out)
    }
}
