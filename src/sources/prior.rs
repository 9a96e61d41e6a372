// src/sources/prior.rs

//! Packages installed by this tool, as recorded in the durable registry

use super::{DetectionSource, ScanOutput, SourceKind};
use crate::db::DurableStore;
use crate::error::Result;
use crate::inventory::SyncEngine;
use crate::job::Job;
use std::sync::Arc;
use tracing::debug;

/// Re-reports every valid registry entry as a candidate
pub struct PriorInstallsSource {
    durable: Arc<dyn DurableStore>,
}

impl PriorInstallsSource {
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self { durable }
    }
}

impl DetectionSource for PriorInstallsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::PriorInstalls
    }

    fn scan(&self, job: &Job) -> Result<ScanOutput> {
        let persisted = SyncEngine::new(Arc::clone(&self.durable)).load()?;

        let mut out = ScanOutput::new();
        for ipv in persisted.get_all() {
            let title = ipv.package.clone();
            out.push(ipv, &title, "");
        }

        debug!("{} prior installations", out.candidates.len());
        job.set_progress(1.0);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{RegistryEntry, SqliteRegistry};
    use crate::version::Version;

    #[test]
    fn test_reports_registry_entries() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SqliteRegistry::open_in_memory().unwrap());
        registry
            .write(
                "org.example.Tool-1.2",
                &RegistryEntry::new(dir.path().to_string_lossy(), "x"),
            )
            .unwrap();
        registry
            .write("org.example.Gone-1", &RegistryEntry::new("/nonexistent/conary/gone", ""))
            .unwrap();

        let source = PriorInstallsSource::new(registry);
        let out = source.scan(&Job::new("test")).unwrap();

        assert_eq!(out.candidates.len(), 1);
        let ipv = &out.candidates[0];
        assert_eq!(ipv.package, "org.example.Tool");
        assert_eq!(ipv.version, Version::parse("1.2").unwrap());
        assert_eq!(ipv.detection_info, "x");
        assert_eq!(out.metadata.packages.len(), 1);
        assert_eq!(out.metadata.versions.len(), 1);
    }
}
