// src/lib.rs

//! Conary installed-software inventory
//!
//! Keeps an authoritative in-process record of which package versions are
//! installed on this machine and where, reconciles it against independent
//! detection sources, and persists it to a durable registry.
//!
//! # Architecture
//!
//! - Single store: one [`InventoryStore`] per process, passed down explicitly
//! - Concurrent scans: detection sources run in parallel, merging is sequential
//! - Heuristic classification: [`PathResolver`] decides ownership of detected directories
//! - Incremental persistence: [`SyncEngine`] writes only changed registry entries

pub mod config;
pub mod db;
mod error;
pub mod filesystem;
pub mod inventory;
pub mod job;
pub mod logging;
pub mod package;
pub mod repository;
pub mod sources;
pub mod version;

pub use config::{InventoryConfig, SystemLayout};
pub use db::{DurableStore, RegistryEntry, SqliteRegistry};
pub use error::{Error, Result};
pub use inventory::{
    Classification, InstalledPackageVersion, InventoryStore, PathResolver, RefreshReport,
    ScanOrchestrator, StatusChange, SyncEngine, find_first_with_missing_dependency,
};
pub use job::Job;
pub use package::{MetadataFragment, Package, PackageVersion, PackageVersionFile};
pub use repository::{MemoryRepository, MetadataRepository};
pub use sources::{DetectionSource, ScanOutput, SourceKind};
pub use version::{Dependency, Version, VersionConstraint};
