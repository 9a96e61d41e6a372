// src/inventory/mod.rs

//! Installed-software inventory
//!
//! - [`InventoryStore`]: in-memory record of installed package versions
//! - [`ScanOrchestrator`]: rebuilds the store from the detection sources
//! - [`PathResolver`]: decides where (and whether) a detection belongs
//! - [`SyncEngine`]: keeps the durable registry in step with the store
//! - [`find_first_with_missing_dependency`]: dependency audit
//!
//! ```ignore
//! let registry: Arc<dyn DurableStore> = Arc::new(SqliteRegistry::open(&config.db_path)?);
//! let store = Arc::new(InventoryStore::with_durable(Arc::clone(&registry)));
//! SyncEngine::new(Arc::clone(&registry)).read_durable_store(&store)?;
//!
//! let scan = ScanOrchestrator::from_config(&config, store, repo, registry);
//! let report = scan.refresh(&Job::new("Detecting installed software"));
//! ```

mod audit;
mod record;
mod resolver;
mod scan;
mod store;
mod sync;

pub use audit::find_first_with_missing_dependency;
pub use record::{InstalledPackageVersion, split_string_id, string_id};
pub use resolver::{Classification, PathResolver};
pub use scan::{RefreshReport, ScanOrchestrator, SourceReport};
pub use store::{InventoryStore, StatusChange};
pub use sync::SyncEngine;
