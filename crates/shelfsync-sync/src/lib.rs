//! Region-scoped catalog synchronization.
//!
//! [`SyncEngine`] walks every region's catalog with its own session under
//! bounded concurrency, resolves one price per item, and reconciles the
//! result against a [`CatalogStore`] with minimal writes.

mod batch;
mod error;
mod orchestrator;
mod reconcile;
mod scheduler;
mod search;
mod store;

pub use batch::{dedupe_first_seen, resolve_batch};
pub use error::SyncError;
pub use orchestrator::{
    RegionCounts, RegionOutcome, RegionReport, RunSummary, SyncEngine, SyncLimits, SyncOptions,
    SyncPhase,
};
pub use reconcile::{changed_fields, reconcile, ProductUpdate, ReconcilePlan, StoredProduct};
pub use scheduler::{RegionSlot, Scheduler};
pub use search::RegionalProduct;
pub use store::{
    ApplyOutcome, CatalogStore, CatalogWrite, DryRunStore, InMemoryCatalogStore, MemoryRun,
    PgCatalogStore, RunLedger,
};
