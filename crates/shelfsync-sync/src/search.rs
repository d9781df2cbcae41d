//! Live, per-region product search.
//!
//! Nothing here touches the store: results come straight from the retailer
//! under a fresh session per region.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use shelfsync_core::{RegionId, ResolvedProduct};
use shelfsync_scraper::{ListingTarget, Transport};
use tokio_util::sync::CancellationToken;

use crate::batch::resolve_batch;
use crate::error::SyncError;
use crate::orchestrator::SyncEngine;
use crate::scheduler::Scheduler;
use crate::store::{CatalogStore, RunLedger};

/// A sellable product as priced in one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalProduct {
    pub region_id: RegionId,
    #[serde(flatten)]
    pub product: ResolvedProduct,
}

impl<T, S> SyncEngine<T, S>
where
    T: Transport,
    S: CatalogStore + RunLedger,
{
    /// Searches `term` in each of `region_ids`, with the same pagination,
    /// deduplication, and price rules as a sync.
    ///
    /// A region whose session cannot be acquired contributes no results and
    /// is logged. Results are grouped by region in the order given.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fetch`] if any region's listing walk fails and
    /// [`SyncError::Cancelled`] if `cancel` fires first.
    pub async fn search_by_term(
        &self,
        term: &str,
        region_ids: &[RegionId],
        cancel: CancellationToken,
    ) -> Result<Vec<RegionalProduct>, SyncError> {
        let term = term.trim();
        if term.is_empty() || region_ids.is_empty() {
            return Ok(Vec::new());
        }

        let scheduler = Scheduler::new(
            self.limits.max_concurrent_regions,
            self.limits.max_concurrent_requests,
            cancel,
        );
        let scheduler = &scheduler;
        let target = &ListingTarget::Search(term.to_owned());

        let mut per_region: Vec<(usize, Vec<RegionalProduct>)> =
            stream::iter(region_ids.iter().copied().enumerate())
                .map(move |(position, region_id)| async move {
                    let products = self.search_region(scheduler, region_id, target).await?;
                    Ok::<_, SyncError>((position, products))
                })
                .buffer_unordered(self.limits.max_concurrent_regions.max(1))
                .try_collect()
                .await?;

        per_region.sort_by_key(|(position, _)| *position);
        Ok(per_region
            .into_iter()
            .flat_map(|(_, products)| products)
            .collect())
    }

    async fn search_region(
        &self,
        scheduler: &Scheduler,
        region_id: RegionId,
        target: &ListingTarget,
    ) -> Result<Vec<RegionalProduct>, SyncError> {
        let slot = scheduler.region_slot().await?;

        let session = match slot
            .until_cancelled(self.client.acquire_session(region_id))
            .await?
        {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(region_id = %region_id, error = %e, "search skipped region, no session");
                return Ok(Vec::new());
            }
        };

        let items = self.walk_listing(&slot, &session, target).await?;
        drop(session);

        let (batch, dropped) = resolve_batch(items, self.store_type);
        tracing::debug!(region_id = %region_id, %target, results = batch.len(), dropped, "search region done");

        Ok(batch
            .into_iter()
            .map(|product| RegionalProduct { region_id, product })
            .collect())
    }
}
