// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use conary_inventory::{
    DetectionSource, InstalledPackageVersion, InventoryStore, Job, MemoryRepository, PathResolver,
    Result, ScanOrchestrator, ScanOutput, SourceKind, SqliteRegistry, SyncEngine, SystemLayout,
    Version,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A throwaway machine: layout directories, registry and repository all
/// live below one temporary directory.
///
/// Keep the struct alive for the duration of the test to prevent cleanup.
pub struct TestSystem {
    pub root: TempDir,
    pub layout: SystemLayout,
    pub db_path: PathBuf,
    pub registry: Arc<SqliteRegistry>,
    pub repo: Arc<MemoryRepository>,
    pub store: Arc<InventoryStore>,
}

impl TestSystem {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let layout = SystemLayout {
            system_root: root.path().join("system"),
            program_dir: root.path().join("programs"),
            program_dir_x86: Some(root.path().join("programs-x86")),
            detected_subdir: "ConaryDetected".to_string(),
        };
        for dir in [
            &layout.system_root,
            &layout.program_dir,
            layout.program_dir_x86.as_ref().unwrap(),
        ] {
            std::fs::create_dir_all(dir).unwrap();
        }

        let db_path = root.path().join("var/lib/conary/inventory.db");
        let registry = Arc::new(SqliteRegistry::open(&db_path).unwrap());

        Self {
            root,
            layout,
            db_path,
            store: Arc::new(InventoryStore::with_durable(registry.clone())),
            registry,
            repo: Arc::new(MemoryRepository::new()),
        }
    }

    /// Create a directory below the temporary root
    pub fn dir(&self, rel: &str) -> PathBuf {
        let dir = self.root.path().join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn sync(&self) -> SyncEngine {
        SyncEngine::new(self.registry.clone())
    }

    /// Orchestrator over this system with the given sources, persisting
    /// to the registry
    pub fn orchestrator(&self, sources: Vec<Box<dyn DetectionSource>>) -> ScanOrchestrator {
        let mut orchestrator = ScanOrchestrator::new(
            self.store.clone(),
            self.repo.clone(),
            PathResolver::new(self.layout.clone(), vec!["os.test".to_string()]),
        )
        .with_sync(self.sync());
        for source in sources {
            orchestrator = orchestrator.with_source(source);
        }
        orchestrator
    }
}

/// Detection source reporting a fixed list of candidates
pub struct ListSource {
    kind: SourceKind,
    entries: Vec<(InstalledPackageVersion, String)>,
    cancel_on_scan: bool,
}

impl ListSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            cancel_on_scan: false,
        }
    }

    /// Add a candidate titled `title`
    pub fn with(mut self, package: &str, title: &str, version: &str, dir: Option<&Path>) -> Self {
        let ipv = InstalledPackageVersion::new(
            package,
            Version::parse(version).unwrap(),
            dir.map(Path::to_path_buf),
        );
        self.entries.push((ipv, title.to_string()));
        self
    }

    /// Cancel the surrounding job while scanning
    pub fn cancelling(mut self) -> Self {
        self.cancel_on_scan = true;
        self
    }

    pub fn boxed(self) -> Box<dyn DetectionSource> {
        Box::new(self)
    }
}

impl DetectionSource for ListSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn scan(&self, job: &Job) -> Result<ScanOutput> {
        if self.cancel_on_scan {
            job.cancel();
        }

        let mut out = ScanOutput::new();
        for (ipv, title) in &self.entries {
            out.push(ipv.clone(), title, "");
        }
        Ok(out)
    }
}

/// Whether any two installed directories are strictly nested
pub fn has_nested_directories(store: &InventoryStore) -> bool {
    let dirs = store.get_all_installed_paths();
    dirs.iter().any(|a| {
        dirs.iter()
            .any(|b| a != b && conary_inventory::filesystem::is_under(a, b))
    })
}
