//! Catalog sync across every region.
//!
//! A run enumerates regions and departments once, then processes regions
//! concurrently under a [`Scheduler`]. Each region gets its own session,
//! walks every department, and reconciles the merged batch against the
//! store. Session failures skip the region and other region failures mark
//! it failed; neither stops the run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use shelfsync_core::{AppConfig, Category, ProductKey, Region, RegionAllowlist, RegionId, StoreType};
use shelfsync_scraper::{
    paginate, ListingTarget, RawItem, RetailerClient, Session, Transport,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::batch::resolve_batch;
use crate::error::SyncError;
use crate::reconcile::reconcile;
use crate::scheduler::{RegionSlot, Scheduler};
use crate::store::{CatalogStore, CatalogWrite, RunLedger};

/// Where a run, or a region within it, currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    DiscoveringRegions,
    AcquiringSession,
    Fetching,
    Resolving,
    Reconciling,
    Done,
    Failed,
}

impl SyncPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DiscoveringRegions => "discovering_regions",
            Self::AcquiringSession => "acquiring_session",
            Self::Fetching => "fetching",
            Self::Resolving => "resolving",
            Self::Reconciling => "reconciling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concurrency limits for one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    /// Regions processed at once; also the cap on live sessions.
    pub max_concurrent_regions: usize,
    /// In-flight page fetches per region.
    pub max_concurrent_requests: usize,
}

impl SyncLimits {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_regions: config.scraper_max_concurrent_regions,
            max_concurrent_requests: config.scraper_max_concurrent_requests,
        }
    }
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            max_concurrent_regions: 3,
            max_concurrent_requests: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Recorded on the run row, e.g. `scheduler`, `api`, `cli`.
    pub trigger_source: String,
    /// When set, only these region ids are synced.
    pub region_filter: Option<Vec<RegionId>>,
    pub allowlist: Option<RegionAllowlist>,
}

impl SyncOptions {
    pub fn new(trigger_source: impl Into<String>) -> Self {
        Self {
            trigger_source: trigger_source.into(),
            region_filter: None,
            allowlist: None,
        }
    }

    #[must_use]
    pub fn with_regions(mut self, region_ids: Vec<RegionId>) -> Self {
        self.region_filter = Some(region_ids);
        self
    }

    #[must_use]
    pub fn with_allowlist(mut self, allowlist: Option<RegionAllowlist>) -> Self {
        self.allowlist = allowlist;
        self
    }

    fn select(&self, enumerated: Vec<Region>) -> Vec<Region> {
        let mut regions = match &self.allowlist {
            Some(allowlist) => allowlist.filter(enumerated),
            None => enumerated,
        };
        if let Some(ids) = &self.region_filter {
            let wanted: HashSet<RegionId> = ids.iter().copied().collect();
            regions.retain(|region| wanted.contains(&region.id));
        }
        regions
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionCounts {
    pub items_fetched: usize,
    /// Sellable, deduplicated products.
    pub resolved: usize,
    /// Unsellable items left out of the batch.
    pub dropped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub prices_recorded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionOutcome {
    Synced(RegionCounts),
    /// No session could be obtained; nothing was fetched or written.
    Skipped { reason: String },
    /// A fetch or the store failed; nothing was written for the region.
    Failed { error: String },
    Cancelled,
}

impl RegionOutcome {
    /// Status as recorded in `sync_run_regions`.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Synced(_) => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } | Self::Cancelled => "skipped",
        }
    }

    #[must_use]
    pub fn counts(&self) -> RegionCounts {
        match self {
            Self::Synced(counts) => *counts,
            _ => RegionCounts::default(),
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Synced(_) => None,
            Self::Skipped { reason } => Some(reason.as_str()),
            Self::Failed { error } => Some(error.as_str()),
            Self::Cancelled => Some("cancelled"),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Skipped { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    pub region: Region,
    pub outcome: RegionOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// `None` when the store does not record runs (dry runs).
    pub sync_run_id: Option<i64>,
    pub categories: usize,
    /// One report per selected region, ordered by region id.
    pub regions: Vec<RegionReport>,
    pub cancelled: bool,
}

impl RunSummary {
    #[must_use]
    pub fn regions_synced(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| matches!(r.outcome, RegionOutcome::Synced(_)))
            .count()
    }

    #[must_use]
    pub fn regions_failed(&self) -> usize {
        self.regions.iter().filter(|r| r.outcome.is_failure()).count()
    }

    #[must_use]
    pub fn products_inserted(&self) -> usize {
        self.regions.iter().map(|r| r.outcome.counts().inserted).sum()
    }

    #[must_use]
    pub fn products_updated(&self) -> usize {
        self.regions.iter().map(|r| r.outcome.counts().updated).sum()
    }
}

/// Drives sync runs against one retailer and one store.
pub struct SyncEngine<T, S> {
    pub(crate) client: RetailerClient<T>,
    pub(crate) store: S,
    pub(crate) store_type: StoreType,
    pub(crate) limits: SyncLimits,
    /// Serializes catalog writes across concurrently finishing regions.
    write_lock: Mutex<()>,
}

impl<T, S> SyncEngine<T, S>
where
    T: Transport,
    S: CatalogStore + RunLedger,
{
    pub fn new(client: RetailerClient<T>, store: S, limits: SyncLimits) -> Self {
        Self {
            client,
            store,
            store_type: StoreType::Woolworths,
            limits,
            write_lock: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &RetailerClient<T> {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enumerates every region the retailer exposes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RegionDiscovery`] if the region list is unavailable.
    pub async fn list_regions(&self) -> Result<Vec<Region>, SyncError> {
        self.client
            .list_regions()
            .await
            .map_err(SyncError::RegionDiscovery)
    }

    /// Lists the department taxonomy. It is region-independent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CategoryDiscovery`] if the category list is
    /// unavailable.
    pub async fn get_categories(&self) -> Result<Vec<Category>, SyncError> {
        self.client
            .list_categories()
            .await
            .map_err(SyncError::CategoryDiscovery)
    }

    /// Runs one full sync.
    ///
    /// Per-region failures are reported in the summary, not returned.
    /// Cancelling `cancel` stops new work, abandons in-flight fetches, and
    /// skips the writes of regions that had not reached the store yet; the
    /// summary is then marked `cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RegionDiscovery`] or [`SyncError::CategoryDiscovery`]
    /// if the run cannot start, and [`SyncError::Store`] if run bookkeeping
    /// fails.
    pub async fn sync_all_regions(
        &self,
        options: &SyncOptions,
        cancel: CancellationToken,
    ) -> Result<RunSummary, SyncError> {
        let run_id = self.store.begin_run(&options.trigger_source).await?;
        tracing::info!(
            sync_run_id = ?run_id,
            trigger = %options.trigger_source,
            phase = %SyncPhase::Idle,
            "sync run started"
        );

        match self.run(options, run_id, &cancel).await {
            Ok(summary) => {
                if let Some(id) = run_id {
                    self.store.finish_run(id, &summary).await?;
                }
                tracing::info!(
                    sync_run_id = ?run_id,
                    phase = %SyncPhase::Done,
                    regions = summary.regions.len(),
                    regions_failed = summary.regions_failed(),
                    inserted = summary.products_inserted(),
                    updated = summary.products_updated(),
                    cancelled = summary.cancelled,
                    "sync run finished"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(sync_run_id = ?run_id, phase = %SyncPhase::Failed, error = %e, "sync run failed");
                if let Some(id) = run_id {
                    if let Err(ledger_err) = self.store.fail_run(id, &e.to_string()).await {
                        tracing::error!(sync_run_id = id, error = %ledger_err, "failed to mark sync run failed");
                    }
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        options: &SyncOptions,
        run_id: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, SyncError> {
        let mut summary = RunSummary {
            sync_run_id: run_id,
            ..RunSummary::default()
        };

        tracing::info!(phase = %SyncPhase::DiscoveringRegions, "discovering regions");
        let discovered = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                summary.cancelled = true;
                return Ok(summary);
            }
            regions = self.list_regions() => regions?,
        };
        let regions = options.select(discovered);
        if regions.is_empty() {
            tracing::warn!("no regions selected, nothing to sync");
            return Ok(summary);
        }

        let categories = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                summary.cancelled = true;
                return Ok(summary);
            }
            categories = self.get_categories() => categories?,
        };
        summary.categories = categories.len();
        tracing::info!(
            regions = regions.len(),
            categories = categories.len(),
            "syncing regions"
        );

        let scheduler = Scheduler::new(
            self.limits.max_concurrent_regions,
            self.limits.max_concurrent_requests,
            cancel.clone(),
        );
        let categories = &categories;
        let scheduler = &scheduler;

        let mut reports = stream::iter(regions)
            .map(move |region| async move {
                let outcome = self.sync_region(scheduler, &region, categories, run_id).await;
                RegionReport { region, outcome }
            })
            .buffer_unordered(self.limits.max_concurrent_regions.max(1));

        while let Some(report) = reports.next().await {
            if let Some(id) = run_id {
                self.store.record_region(id, &report).await?;
            }
            summary.regions.push(report);
        }

        summary.regions.sort_by_key(|report| report.region.id);
        summary.cancelled = cancel.is_cancelled();
        Ok(summary)
    }

    async fn sync_region(
        &self,
        scheduler: &Scheduler,
        region: &Region,
        categories: &[Category],
        run_id: Option<i64>,
    ) -> RegionOutcome {
        let Ok(slot) = scheduler.region_slot().await else {
            return RegionOutcome::Cancelled;
        };

        tracing::debug!(region_id = %region.id, phase = %SyncPhase::AcquiringSession, "acquiring session");
        let session = match slot.until_cancelled(self.client.acquire_session(region.id)).await {
            Err(_) => return RegionOutcome::Cancelled,
            Ok(Err(e)) => {
                tracing::warn!(region_id = %region.id, region = %region.name, error = %e, "skipping region, no session");
                return RegionOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
            Ok(Ok(session)) => session,
        };

        tracing::debug!(region_id = %region.id, phase = %SyncPhase::Fetching, categories = categories.len(), "fetching catalog");
        let fetched = self.fetch_region(&slot, &session, categories).await;
        drop(session);

        let items = match fetched {
            Ok(items) => items,
            Err(SyncError::Cancelled) => return RegionOutcome::Cancelled,
            Err(e) => {
                tracing::error!(region_id = %region.id, region = %region.name, error = %e, "region fetch failed");
                return RegionOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match self.reconcile_region(&slot, region.id, items, run_id).await {
            Ok(counts) => {
                tracing::info!(
                    region_id = %region.id,
                    region = %region.name,
                    items = counts.items_fetched,
                    resolved = counts.resolved,
                    dropped = counts.dropped,
                    inserted = counts.inserted,
                    updated = counts.updated,
                    prices = counts.prices_recorded,
                    "region synced"
                );
                RegionOutcome::Synced(counts)
            }
            Err(SyncError::Cancelled) => RegionOutcome::Cancelled,
            Err(e) => {
                tracing::error!(region_id = %region.id, region = %region.name, error = %e, "region reconcile failed");
                RegionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Walks every department under `session`, at most the slot's request
    /// limit at once. Any department failure fails the region.
    async fn fetch_region(
        &self,
        slot: &RegionSlot,
        session: &Session,
        categories: &[Category],
    ) -> Result<Vec<RawItem>, SyncError> {
        stream::iter(categories.iter().cloned())
            .map(move |category| async move {
                let target = ListingTarget::Category(category.slug);
                self.walk_listing(slot, session, &target).await
            })
            .buffer_unordered(self.limits.max_concurrent_requests.max(1))
            .try_fold(Vec::new(), |mut all, items| async move {
                all.extend(items);
                Ok(all)
            })
            .await
    }

    /// Collects every page of `target`, gating each page fetch on a request
    /// permit and the run's cancellation. The pause between pages is also
    /// raced against cancellation.
    pub(crate) async fn walk_listing(
        &self,
        slot: &RegionSlot,
        session: &Session,
        target: &ListingTarget,
    ) -> Result<Vec<RawItem>, SyncError> {
        let settings = self.client.settings();
        let delay = settings.inter_page_delay;
        let context = format!("region {} {target}", session.region_id());
        paginate(
            context,
            settings.max_pages,
            Duration::ZERO,
            move |page| async move {
                if page > 1 {
                    slot.pause(delay).await?;
                }
                slot.fetch(self.client.fetch_listing_page(session, target, page))
                    .await
            },
        )
        .try_collect()
        .await
    }

    async fn reconcile_region(
        &self,
        slot: &RegionSlot,
        region_id: RegionId,
        items: Vec<RawItem>,
        run_id: Option<i64>,
    ) -> Result<RegionCounts, SyncError> {
        let items_fetched = items.len();

        tracing::debug!(region_id = %region_id, phase = %SyncPhase::Resolving, items = items_fetched, "resolving prices");
        let (batch, dropped) = resolve_batch(items, self.store_type);

        // The plan must be computed against the state it is applied to, so the
        // lock covers the read as well as the write.
        let _write = slot.until_cancelled(self.write_lock.lock()).await?;

        tracing::debug!(region_id = %region_id, phase = %SyncPhase::Reconciling, batch = batch.len(), "reconciling");
        let keys: Vec<ProductKey> = batch.iter().map(|p| p.key()).collect();
        let existing: HashMap<ProductKey, _> = self
            .store
            .find_existing(&keys)
            .await?
            .into_iter()
            .map(|stored| (stored.key.clone(), stored))
            .collect();
        let plan = reconcile(&batch, &existing);

        let applied = self
            .store
            .apply(CatalogWrite {
                region_id,
                sync_run_id: run_id,
                plan: &plan,
                prices: &batch,
            })
            .await?;

        Ok(RegionCounts {
            items_fetched,
            resolved: batch.len(),
            dropped,
            inserted: applied.inserted,
            updated: applied.updated,
            prices_recorded: applied.prices_recorded,
        })
    }
}
