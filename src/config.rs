// src/config.rs

//! Inventory configuration
//!
//! Everything platform-specific the classifier needs (where the operating
//! system lives, where programs are installed, which identities belong to
//! the OS) is carried here so tests can point the engine at a temporary
//! directory tree.
//!
//! ```toml
//! db_path = "/var/lib/conary/inventory.db"
//! os_packages = ["os.linux"]
//!
//! [layout]
//! system_root = "/usr"
//! program_dir = "/opt"
//! detected_subdir = "ConaryDetected"
//! ```

use crate::db::paths::{DEFAULT_DB_PATH, resolve_db_path};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories the classifier treats specially
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemLayout {
    /// Operating system directory; nothing but the OS may claim it
    pub system_root: PathBuf,
    /// Primary system-wide program directory
    pub program_dir: PathBuf,
    /// Secondary (32-bit) program directory on 64-bit systems
    pub program_dir_x86: Option<PathBuf>,
    /// Subdirectory of `program_dir` receiving synthesized locations
    pub detected_subdir: String,
}

impl SystemLayout {
    /// Root of the synthesized "detected software" subtree
    pub fn detected_root(&self) -> PathBuf {
        self.program_dir.join(&self.detected_subdir)
    }
}

impl Default for SystemLayout {
    #[cfg(windows)]
    fn default() -> Self {
        let env_dir = |name: &str, fallback: &str| {
            std::env::var_os(name)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(fallback))
        };
        Self {
            system_root: env_dir("SystemRoot", "C:\\Windows"),
            program_dir: env_dir("ProgramFiles", "C:\\Program Files"),
            program_dir_x86: std::env::var_os("ProgramFiles(x86)").map(PathBuf::from),
            detected_subdir: "ConaryDetected".to_string(),
        }
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        Self {
            system_root: PathBuf::from("/usr"),
            program_dir: PathBuf::from("/opt"),
            program_dir_x86: None,
            detected_subdir: "ConaryDetected".to_string(),
        }
    }
}

/// Operating system identities allowed to claim the system root
fn default_os_packages() -> Vec<String> {
    if cfg!(windows) {
        vec![
            "com.microsoft.Windows".to_string(),
            "com.microsoft.Windows32".to_string(),
            "com.microsoft.Windows64".to_string(),
        ]
    } else {
        vec!["os.linux".to_string()]
    }
}

fn default_desktop_dirs() -> Vec<PathBuf> {
    if cfg!(windows) {
        Vec::new()
    } else {
        vec![
            PathBuf::from("/usr/share/applications"),
            PathBuf::from("/usr/local/share/applications"),
        ]
    }
}

/// Top-level inventory configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Location of the durable registry
    pub db_path: PathBuf,
    pub layout: SystemLayout,
    pub os_packages: Vec<String>,
    /// Identity under which this tool reports itself
    pub self_package: String,
    /// Directories scanned for program listings (`.desktop` entries)
    pub desktop_dirs: Vec<PathBuf>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            layout: SystemLayout::default(),
            os_packages: default_os_packages(),
            self_package: "org.conary.Conary".to_string(),
            desktop_dirs: default_desktop_dirs(),
        }
    }
}

impl InventoryConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("conary")
            .join("inventory.toml")
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)
            .map_err(|e| Error::ConfigError(format!("Invalid inventory configuration: {}", e)))?;
        config.db_path = resolve_db_path(&config.db_path);
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Load configuration from a file, falling back to defaults if it
    /// does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            let mut config = Self::default();
            config.db_path = resolve_db_path(&config.db_path);
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = InventoryConfig::from_toml(
            r#"
            self_package = "org.example.Tool"

            [layout]
            program_dir = "/srv/programs"
            "#,
        )
        .unwrap();

        assert_eq!(config.self_package, "org.example.Tool");
        assert_eq!(config.layout.program_dir, PathBuf::from("/srv/programs"));
        assert_eq!(config.layout.detected_subdir, "ConaryDetected");
        assert_eq!(config.os_packages, default_os_packages());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = InventoryConfig::from_toml("layout = 3").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = InventoryConfig::load_or_default(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.layout, SystemLayout::default());
    }

    #[test]
    fn test_detected_root() {
        let layout = SystemLayout {
            program_dir: PathBuf::from("/opt"),
            ..SystemLayout::default()
        };
        assert_eq!(layout.detected_root(), PathBuf::from("/opt/ConaryDetected"));
    }
}
