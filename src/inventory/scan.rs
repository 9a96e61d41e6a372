// src/inventory/scan.rs

//! Refresh cycle: scan every detection source and rebuild the inventory
//!
//! Sources scan concurrently on a dedicated thread pool, one worker per
//! source, each writing only to its own output. After the join, outputs
//! are merged and classified strictly sequentially in source priority
//! order, then the result is persisted.

use super::record::InstalledPackageVersion;
use super::resolver::{Classification, PathResolver};
use super::store::InventoryStore;
use super::sync::SyncEngine;
use crate::config::InventoryConfig;
use crate::db::DurableStore;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::package::MetadataFragment;
use crate::repository::MetadataRepository;
use crate::sources::{
    DesktopEntrySource, DetectionSource, PriorInstallsSource, ScanOutput, SourceKind,
    SystemPackagesSource, WellKnownSource,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Share of the progress range spent scanning
const SCAN_WEIGHT: f64 = 0.5;
/// Share spent merging and classifying
const DETECT_WEIGHT: f64 = 0.4;
/// Share of each remaining phase (environment variable, save)
const FINISH_WEIGHT: f64 = 0.05;

/// What one source contributed to a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub kind: SourceKind,
    /// Candidates reported by the source
    pub candidates: usize,
    /// Scan or merge failure, if any
    pub error: Option<String>,
}

/// Outcome of a refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// One entry per source, in priority order
    pub sources: Vec<SourceReport>,
    pub accepted: usize,
    pub discarded: usize,
    /// Candidates whose package version was already recorded
    pub skipped: usize,
    /// Candidates dropped because of a lookup or I/O failure
    pub failed: usize,
    pub cancelled: bool,
}

impl RefreshReport {
    pub fn total_candidates(&self) -> usize {
        self.sources.iter().map(|s| s.candidates).sum()
    }

    fn tally(&mut self, result: &Result<Classification>) {
        match result {
            Ok(Classification::Accepted { .. }) => self.accepted += 1,
            Ok(Classification::Discarded) => self.discarded += 1,
            Ok(Classification::AlreadyInstalled) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Rebuilds an [`InventoryStore`] from its detection sources
pub struct ScanOrchestrator {
    /// Kept sorted by [`SourceKind`]
    sources: Vec<Box<dyn DetectionSource>>,
    store: Arc<InventoryStore>,
    repo: Arc<dyn MetadataRepository>,
    resolver: PathResolver,
    sync: Option<SyncEngine>,
}

impl ScanOrchestrator {
    /// Create an orchestrator without sources or persistence
    pub fn new(
        store: Arc<InventoryStore>,
        repo: Arc<dyn MetadataRepository>,
        resolver: PathResolver,
    ) -> Self {
        Self {
            sources: Vec::new(),
            store,
            repo,
            resolver,
            sync: None,
        }
    }

    /// Create an orchestrator with the standard sources, persisting to
    /// `durable`
    pub fn from_config(
        config: &InventoryConfig,
        store: Arc<InventoryStore>,
        repo: Arc<dyn MetadataRepository>,
        durable: Arc<dyn DurableStore>,
    ) -> Self {
        Self::new(store, repo, PathResolver::from_config(config))
            .with_source(Box::new(PriorInstallsSource::new(Arc::clone(&durable))))
            .with_source(Box::new(WellKnownSource::new(config)))
            .with_source(Box::new(SystemPackagesSource::new()))
            .with_source(Box::new(DesktopEntrySource::new(config.desktop_dirs.clone())))
            .with_sync(SyncEngine::new(durable))
    }

    /// Add a detection source
    pub fn with_source(mut self, source: Box<dyn DetectionSource>) -> Self {
        self.sources.push(source);
        self.sources.sort_by_key(|s| s.kind());
        self
    }

    /// Persist the inventory through `sync` at the end of each cycle
    pub fn with_sync(mut self, sync: SyncEngine) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn store(&self) -> &Arc<InventoryStore> {
        &self.store
    }

    /// Run one refresh cycle
    ///
    /// Cancellation is checked before every phase; skipped phases leave
    /// the store as the earlier phases built it. Failures meant for the
    /// user end up in the job's error message. The job is always
    /// completed.
    pub fn refresh(&self, job: &Job) -> RefreshReport {
        let mut report = RefreshReport::default();
        info!("Refreshing installed packages from {} sources", self.sources.len());

        if job.should_proceed() {
            self.store.clear();
        }

        let outputs = if job.should_proceed() {
            let scan_job = job.new_sub_job(SCAN_WEIGHT, "Detecting installed software");
            let outputs = self.scan_all(&scan_job);
            scan_job.complete_with_progress();
            outputs
        } else {
            Vec::new()
        };

        let share = DETECT_WEIGHT / self.sources.len().max(1) as f64;
        for (source, output) in self.sources.iter().zip(outputs) {
            let kind = source.kind();
            let phase = job.new_sub_job(share, format!("Processing {}", kind));

            match output {
                Ok(output) => {
                    let mut source_report = SourceReport {
                        kind,
                        candidates: output.candidates.len(),
                        error: None,
                    };
                    let ScanOutput {
                        candidates,
                        metadata,
                    } = output;

                    if let Err(e) = self.add_packages(&phase, kind, &candidates, metadata) {
                        warn!("Cannot store definitions from {}: {}", kind, e);
                        source_report.error = Some(e.to_string());
                    }
                    self.detect(&phase, kind, &candidates, &mut report);
                    report.sources.push(source_report);
                }
                Err(e) => {
                    warn!("Detecting {} failed: {}", kind, e);
                    report.sources.push(SourceReport {
                        kind,
                        candidates: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
            phase.complete_with_progress();
        }

        if job.should_proceed() {
            let env_job = job.new_sub_job(FINISH_WEIGHT, "Updating environment");
            if let Err(e) = self.repo.update_env_var(&self.store.get_all()) {
                env_job.set_error_message(e.to_string());
            }
            env_job.complete_with_progress();
        }

        if job.should_proceed()
            && let Some(sync) = &self.sync
        {
            let save_job = job.new_sub_job(FINISH_WEIGHT, "Saving installed packages");
            if let Err(e) = sync.save(&self.store) {
                save_job.set_error_message(e.to_string());
            }
            save_job.complete_with_progress();
        }

        report.cancelled = job.is_cancelled();
        if !report.cancelled && job.error_message().is_none() {
            job.set_progress(1.0);
        }
        job.complete();

        info!(
            "Refresh finished: {} accepted, {} discarded, {} skipped, {} failed{}",
            report.accepted,
            report.discarded,
            report.skipped,
            report.failed,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    /// Run every source concurrently, one worker each
    ///
    /// The scan job advances by one share per finished source. Per-source
    /// jobs carry no weight of their own since they overlap in time.
    fn scan_all(&self, scan_job: &Job) -> Vec<Result<ScanOutput>> {
        let n = self.sources.len().max(1);
        let jobs: Vec<Job> = self
            .sources
            .iter()
            .map(|s| scan_job.new_sub_job(0.0, format!("Detecting {}", s.kind())))
            .collect();
        let finished = AtomicUsize::new(0);

        let run = |(source, sub): (&Box<dyn DetectionSource>, &Job)| {
            let output = source.scan(sub);
            sub.complete_with_progress();
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            scan_job.set_progress(done as f64 / n as f64);
            output
        };

        match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
            Ok(pool) => pool.install(|| {
                self.sources
                    .par_iter()
                    .zip(jobs.par_iter())
                    .map(run)
                    .collect()
            }),
            Err(e) => {
                warn!("Cannot start scan workers, scanning sequentially: {}", e);
                self.sources.iter().zip(jobs.iter()).map(run).collect()
            }
        }
    }

    /// Drop definitions the source no longer reports installed and merge
    /// the rest into the repository
    fn add_packages(
        &self,
        job: &Job,
        kind: SourceKind,
        candidates: &[InstalledPackageVersion],
        mut metadata: MetadataFragment,
    ) -> Result<()> {
        if !job.should_proceed() {
            return Ok(());
        }

        let observed: HashSet<String> = candidates.iter().map(|c| c.package.clone()).collect();
        metadata.retain_packages(&observed);

        debug!(
            "Merging {} packages and {} versions from {}",
            metadata.packages.len(),
            metadata.versions.len(),
            kind
        );
        self.repo
            .save_all(&metadata, kind.replaces_metadata())
            .map_err(|e| Error::ScanError(format!("Merging {} failed: {}", kind, e)))
    }

    /// Classify every candidate of one source
    fn detect(
        &self,
        job: &Job,
        kind: SourceKind,
        candidates: &[InstalledPackageVersion],
        report: &mut RefreshReport,
    ) {
        if !job.should_proceed() {
            return;
        }

        let total = candidates.len().max(1) as f64;
        for (i, candidate) in candidates.iter().enumerate() {
            let result = self.resolver.classify(
                &self.store,
                self.repo.as_ref(),
                candidate,
                kind.detection_info_prefix(),
            );
            if let Err(e) = &result {
                warn!(
                    "Skipping {} {} from {}: {}",
                    candidate.package, candidate.version, kind, e
                );
            }
            report.tally(&result);
            job.set_progress((i + 1) as f64 / total);
        }
    }
}
