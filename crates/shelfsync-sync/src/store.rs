//! Storage seams for the sync engine.
//!
//! [`CatalogStore`] covers the product catalog, [`RunLedger`] covers run
//! bookkeeping. [`PgCatalogStore`] implements both on Postgres;
//! [`InMemoryCatalogStore`] and [`DryRunStore`] exist for tests and for
//! `--dry-run` invocations.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use shelfsync_core::{ProductKey, RegionId, ResolvedProduct, StoreType};
use shelfsync_db::{DbError, RunTotals};
use sqlx::PgPool;

use crate::orchestrator::{RegionReport, RunSummary};
use crate::reconcile::{ReconcilePlan, StoredProduct};

/// One region's reconciled batch, applied atomically.
#[derive(Debug, Clone, Copy)]
pub struct CatalogWrite<'a> {
    pub region_id: RegionId,
    pub sync_run_id: Option<i64>,
    pub plan: &'a ReconcilePlan,
    /// Every resolved product of the batch; each price is recorded for
    /// `region_id` if it differs from the last one captured.
    pub prices: &'a [ResolvedProduct],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub prices_recorded: usize,
}

pub trait CatalogStore: Send + Sync {
    /// Returns the stored products among `keys`. Missing keys are absent.
    fn find_existing(
        &self,
        keys: &[ProductKey],
    ) -> impl Future<Output = Result<Vec<StoredProduct>, DbError>> + Send;

    /// Applies a plan and its prices. Either everything is written or nothing.
    fn apply(
        &self,
        write: CatalogWrite<'_>,
    ) -> impl Future<Output = Result<ApplyOutcome, DbError>> + Send;
}

/// Run bookkeeping. A `begin_run` returning `None` disables the other calls.
pub trait RunLedger: Send + Sync {
    fn begin_run(
        &self,
        trigger_source: &str,
    ) -> impl Future<Output = Result<Option<i64>, DbError>> + Send;

    fn record_region(
        &self,
        run_id: i64,
        report: &RegionReport,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Closes the run as succeeded, or as cancelled if `summary.cancelled`.
    fn finish_run(
        &self,
        run_id: i64,
        summary: &RunSummary,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    fn fail_run(
        &self,
        run_id: i64,
        message: &str,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

fn count_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn run_totals(summary: &RunSummary) -> RunTotals {
    RunTotals {
        regions_total: count_i32(summary.regions.len()),
        regions_failed: count_i32(summary.regions_failed()),
        products_inserted: count_i32(summary.products_inserted()),
        products_updated: count_i32(summary.products_updated()),
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl CatalogStore for PgCatalogStore {
    async fn find_existing(&self, keys: &[ProductKey]) -> Result<Vec<StoredProduct>, DbError> {
        let mut skus_by_store: BTreeMap<i16, (StoreType, Vec<String>)> = BTreeMap::new();
        for key in keys {
            skus_by_store
                .entry(key.store_type.as_i16())
                .or_insert_with(|| (key.store_type, Vec::new()))
                .1
                .push(key.sku.clone());
        }

        let mut stored = Vec::with_capacity(keys.len());
        for (store_type, skus) in skus_by_store.into_values() {
            let rows = shelfsync_db::find_existing_products(&self.pool, store_type, &skus).await?;
            for row in rows {
                stored.push(StoredProduct {
                    key: row.key()?,
                    name: row.name,
                    brand: row.brand,
                    image_url: row.image_url,
                    max_quantity: row.max_quantity,
                });
            }
        }
        Ok(stored)
    }

    async fn apply(&self, write: CatalogWrite<'_>) -> Result<ApplyOutcome, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut outcome = ApplyOutcome::default();

        for product in &write.plan.to_insert {
            if shelfsync_db::insert_product(&mut *tx, product).await? {
                outcome.inserted += 1;
            }
        }
        for update in &write.plan.to_update {
            if shelfsync_db::update_product_fields(&mut *tx, &update.product, &update.changed)
                .await?
            {
                outcome.updated += 1;
            }
        }
        for product in write.prices {
            if shelfsync_db::record_price_if_changed(
                &mut *tx,
                &product.key(),
                write.region_id,
                write.sync_run_id,
                product.price,
            )
            .await?
            {
                outcome.prices_recorded += 1;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

impl RunLedger for PgCatalogStore {
    async fn begin_run(&self, trigger_source: &str) -> Result<Option<i64>, DbError> {
        let run = shelfsync_db::create_sync_run(&self.pool, trigger_source).await?;
        shelfsync_db::start_sync_run(&self.pool, run.id).await?;
        Ok(Some(run.id))
    }

    async fn record_region(&self, run_id: i64, report: &RegionReport) -> Result<(), DbError> {
        let counts = report.outcome.counts();
        shelfsync_db::record_sync_run_region(
            &self.pool,
            run_id,
            &report.region,
            report.outcome.status(),
            count_i32(counts.items_fetched),
            count_i32(counts.inserted),
            count_i32(counts.updated),
            report.outcome.error_message(),
        )
        .await
    }

    async fn finish_run(&self, run_id: i64, summary: &RunSummary) -> Result<(), DbError> {
        let totals = run_totals(summary);
        if summary.cancelled {
            shelfsync_db::cancel_sync_run(&self.pool, run_id, totals).await
        } else {
            shelfsync_db::complete_sync_run(&self.pool, run_id, totals).await
        }
    }

    async fn fail_run(&self, run_id: i64, message: &str) -> Result<(), DbError> {
        shelfsync_db::fail_sync_run(&self.pool, run_id, message).await
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductKey, StoredProduct>,
    prices: HashMap<(ProductKey, RegionId), Vec<Decimal>>,
    failing_regions: HashSet<RegionId>,
    runs: Vec<MemoryRun>,
}

/// A run as seen by [`InMemoryCatalogStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRun {
    pub id: i64,
    pub trigger_source: String,
    pub status: &'static str,
    pub totals: RunTotals,
    /// `(region, status)` in the order they were recorded.
    pub regions: Vec<(RegionId, &'static str)>,
}

/// Process-local store with the same observable semantics as
/// [`PgCatalogStore`], including all-or-nothing `apply`.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    state: Mutex<MemoryState>,
}

impl InMemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a stored product without going through `apply`.
    pub fn insert_stored(&self, product: StoredProduct) {
        self.state().products.insert(product.key.clone(), product);
    }

    /// Makes every later `apply` for `region_id` fail.
    pub fn fail_apply_for(&self, region_id: RegionId) {
        self.state().failing_regions.insert(region_id);
    }

    #[must_use]
    pub fn product(&self, key: &ProductKey) -> Option<StoredProduct> {
        self.state().products.get(key).cloned()
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.state().products.len()
    }

    /// Recorded prices for one (product, region), oldest first.
    #[must_use]
    pub fn price_history(&self, key: &ProductKey, region_id: RegionId) -> Vec<Decimal> {
        self.state()
            .prices
            .get(&(key.clone(), region_id))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn runs(&self) -> Vec<MemoryRun> {
        self.state().runs.clone()
    }
}

impl CatalogStore for InMemoryCatalogStore {
    async fn find_existing(&self, keys: &[ProductKey]) -> Result<Vec<StoredProduct>, DbError> {
        let state = self.state();
        Ok(keys
            .iter()
            .filter_map(|key| state.products.get(key).cloned())
            .collect())
    }

    async fn apply(&self, write: CatalogWrite<'_>) -> Result<ApplyOutcome, DbError> {
        let mut state = self.state();
        if state.failing_regions.contains(&write.region_id) {
            return Err(DbError::Sqlx(sqlx::Error::PoolClosed));
        }

        let mut outcome = ApplyOutcome::default();
        for product in &write.plan.to_insert {
            let key = product.key();
            if !state.products.contains_key(&key) {
                state.products.insert(key, StoredProduct::from(product));
                outcome.inserted += 1;
            }
        }
        for update in &write.plan.to_update {
            let key = update.product.key();
            if let Some(stored) = state.products.get_mut(&key) {
                *stored = StoredProduct::from(&update.product);
                outcome.updated += 1;
            }
        }
        for product in write.prices {
            let key = product.key();
            if !state.products.contains_key(&key) {
                continue;
            }
            let history = state.prices.entry((key, write.region_id)).or_default();
            if history.last() != Some(&product.price) {
                history.push(product.price);
                outcome.prices_recorded += 1;
            }
        }
        Ok(outcome)
    }
}

impl RunLedger for InMemoryCatalogStore {
    async fn begin_run(&self, trigger_source: &str) -> Result<Option<i64>, DbError> {
        let mut state = self.state();
        let id = i64::try_from(state.runs.len()).unwrap_or(i64::MAX - 1) + 1;
        state.runs.push(MemoryRun {
            id,
            trigger_source: trigger_source.to_owned(),
            status: "running",
            totals: RunTotals::default(),
            regions: Vec::new(),
        });
        Ok(Some(id))
    }

    async fn record_region(&self, run_id: i64, report: &RegionReport) -> Result<(), DbError> {
        let mut state = self.state();
        let run = state
            .runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or(DbError::NotFound)?;
        run.regions
            .push((report.region.id, report.outcome.status()));
        Ok(())
    }

    async fn finish_run(&self, run_id: i64, summary: &RunSummary) -> Result<(), DbError> {
        let status = if summary.cancelled {
            "cancelled"
        } else {
            "succeeded"
        };
        self.close_run(run_id, status, run_totals(summary))
    }

    async fn fail_run(&self, run_id: i64, _message: &str) -> Result<(), DbError> {
        self.close_run(run_id, "failed", RunTotals::default())
    }
}

impl InMemoryCatalogStore {
    fn close_run(&self, run_id: i64, status: &'static str, totals: RunTotals) -> Result<(), DbError> {
        let mut state = self.state();
        let run = state
            .runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or(DbError::NotFound)?;
        if run.status != "running" {
            return Err(DbError::InvalidSyncRunTransition {
                id: run_id,
                expected_status: "running",
            });
        }
        run.status = status;
        run.totals = totals;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// Reads through to `S`, never writes.
///
/// What earlier regions would have written is kept in an overlay that later
/// reads see, so the reported counts match a real run. Price changes are not
/// evaluated, so `prices_recorded` is always zero. No run is recorded.
#[derive(Debug)]
pub struct DryRunStore<S> {
    inner: S,
    overlay: Mutex<HashMap<ProductKey, StoredProduct>>,
}

impl<S> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            overlay: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn overlay(&self) -> MutexGuard<'_, HashMap<ProductKey, StoredProduct>> {
        self.overlay.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: CatalogStore> CatalogStore for DryRunStore<S> {
    async fn find_existing(&self, keys: &[ProductKey]) -> Result<Vec<StoredProduct>, DbError> {
        let stored = self.inner.find_existing(keys).await?;

        let overlay = self.overlay();
        let mut found: Vec<StoredProduct> = stored
            .into_iter()
            .filter(|product| !overlay.contains_key(&product.key))
            .collect();
        found.extend(keys.iter().filter_map(|key| overlay.get(key)).cloned());
        Ok(found)
    }

    async fn apply(&self, write: CatalogWrite<'_>) -> Result<ApplyOutcome, DbError> {
        let mut overlay = self.overlay();
        let mut inserted = 0;
        for product in &write.plan.to_insert {
            let stored = StoredProduct::from(product);
            if !overlay.contains_key(&stored.key) {
                overlay.insert(stored.key.clone(), stored);
                inserted += 1;
            }
        }
        for update in &write.plan.to_update {
            let stored = StoredProduct::from(&update.product);
            overlay.insert(stored.key.clone(), stored);
        }

        Ok(ApplyOutcome {
            inserted,
            updated: write.plan.to_update.len(),
            prices_recorded: 0,
        })
    }
}

impl<S: Send + Sync> RunLedger for DryRunStore<S> {
    async fn begin_run(&self, _trigger_source: &str) -> Result<Option<i64>, DbError> {
        Ok(None)
    }

    async fn record_region(&self, _run_id: i64, _report: &RegionReport) -> Result<(), DbError> {
        Ok(())
    }

    async fn finish_run(&self, _run_id: i64, _summary: &RunSummary) -> Result<(), DbError> {
        Ok(())
    }

    async fn fail_run(&self, _run_id: i64, _message: &str) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_core::{ChangedField, StoreType};

    use crate::reconcile::{reconcile, ProductUpdate};

    fn product(sku: &str, cents: i64) -> ResolvedProduct {
        ResolvedProduct {
            sku: sku.to_owned(),
            store_type: StoreType::Woolworths,
            name: format!("Product {sku}"),
            brand: None,
            image_url: None,
            max_quantity: 10,
            price: Decimal::new(cents, 2),
        }
    }

    fn write<'a>(
        region: i64,
        plan: &'a ReconcilePlan,
        prices: &'a [ResolvedProduct],
    ) -> CatalogWrite<'a> {
        CatalogWrite {
            region_id: RegionId(region),
            sync_run_id: None,
            plan,
            prices,
        }
    }

    #[tokio::test]
    async fn in_memory_apply_inserts_and_records_prices_once() {
        let store = InMemoryCatalogStore::new();
        let batch = vec![product("1", 399), product("2", 250)];
        let plan = reconcile(&batch, &HashMap::new());

        let first = store.apply(write(7, &plan, &batch)).await.unwrap();
        assert_eq!(
            first,
            ApplyOutcome {
                inserted: 2,
                updated: 0,
                prices_recorded: 2
            }
        );

        let empty = ReconcilePlan::default();
        let second = store.apply(write(7, &empty, &batch)).await.unwrap();
        assert_eq!(second.prices_recorded, 0);

        let key = ProductKey::new("1", StoreType::Woolworths);
        assert_eq!(
            store.price_history(&key, RegionId(7)),
            vec![Decimal::new(399, 2)]
        );
    }

    #[tokio::test]
    async fn prices_are_tracked_per_region() {
        let store = InMemoryCatalogStore::new();
        let batch = vec![product("1", 399)];
        let plan = reconcile(&batch, &HashMap::new());
        store.apply(write(1, &plan, &batch)).await.unwrap();

        let cheaper = vec![product("1", 349)];
        let outcome = store
            .apply(write(2, &ReconcilePlan::default(), &cheaper))
            .await
            .unwrap();
        assert_eq!(outcome.prices_recorded, 1);

        let key = ProductKey::new("1", StoreType::Woolworths);
        assert_eq!(store.price_history(&key, RegionId(1)), vec![Decimal::new(399, 2)]);
        assert_eq!(store.price_history(&key, RegionId(2)), vec![Decimal::new(349, 2)]);
    }

    #[tokio::test]
    async fn update_rewrites_stored_fields() {
        let store = InMemoryCatalogStore::new();
        let old = product("1", 399);
        store.insert_stored(StoredProduct::from(&old));

        let mut fresh = old.clone();
        fresh.max_quantity = 3;
        let plan = ReconcilePlan {
            to_insert: Vec::new(),
            to_update: vec![ProductUpdate {
                product: fresh.clone(),
                changed: vec![ChangedField::MaxQuantity],
            }],
            unchanged: 0,
        };
        let outcome = store.apply(write(1, &plan, &[])).await.unwrap();

        assert_eq!(outcome.updated, 1);
        assert_eq!(store.product(&fresh.key()).unwrap().max_quantity, 3);
    }

    #[tokio::test]
    async fn failing_region_writes_nothing() {
        let store = InMemoryCatalogStore::new();
        store.fail_apply_for(RegionId(9));
        let batch = vec![product("1", 399)];
        let plan = reconcile(&batch, &HashMap::new());

        let result = store.apply(write(9, &plan, &batch)).await;

        assert!(matches!(result, Err(DbError::Sqlx(_))));
        assert_eq!(store.product_count(), 0);
    }

    #[tokio::test]
    async fn dry_run_reads_through_and_writes_nothing() {
        let inner = InMemoryCatalogStore::new();
        let stored = product("1", 399);
        inner.insert_stored(StoredProduct::from(&stored));
        let dry = DryRunStore::new(inner);

        let found = dry.find_existing(&[stored.key()]).await.unwrap();
        assert_eq!(found.len(), 1);

        let batch = vec![product("2", 100)];
        let plan = reconcile(&batch, &HashMap::new());
        let outcome = dry.apply(write(1, &plan, &batch)).await.unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(dry.begin_run("manual").await.unwrap(), None);

        let inner = dry.into_inner();
        assert_eq!(inner.product_count(), 1);
        assert!(inner.runs().is_empty());
    }

    #[tokio::test]
    async fn dry_run_sees_its_own_would_be_writes() {
        let dry = DryRunStore::new(InMemoryCatalogStore::new());
        let first = vec![product("1", 399), product("2", 100)];
        let plan = reconcile(&first, &HashMap::new());
        assert_eq!(dry.apply(write(1, &plan, &first)).await.unwrap().inserted, 2);

        let mut renamed = product("2", 100);
        renamed.name = "Renamed".to_owned();
        let second = vec![product("1", 450), renamed];
        let keys: Vec<ProductKey> = second.iter().map(ResolvedProduct::key).collect();
        let existing: HashMap<ProductKey, StoredProduct> = dry
            .find_existing(&keys)
            .await
            .unwrap()
            .into_iter()
            .map(|stored| (stored.key.clone(), stored))
            .collect();
        let plan = reconcile(&second, &existing);

        assert!(plan.to_insert.is_empty());
        assert_eq!(plan.to_update.len(), 1);
        let outcome = dry.apply(write(2, &plan, &second)).await.unwrap();
        assert_eq!((outcome.inserted, outcome.updated), (0, 1));
        assert_eq!(dry.inner().product_count(), 0);
    }

    #[tokio::test]
    async fn closing_a_run_twice_is_rejected() {
        let store = InMemoryCatalogStore::new();
        let id = store.begin_run("test").await.unwrap().unwrap();
        store.fail_run(id, "boom").await.unwrap();

        let again = store.fail_run(id, "boom").await;
        assert!(matches!(
            again,
            Err(DbError::InvalidSyncRunTransition { expected_status: "running", .. })
        ));
        assert_eq!(store.runs()[0].status, "failed");
    }
}
