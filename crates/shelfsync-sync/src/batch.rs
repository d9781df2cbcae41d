//! Turning a region's raw listing items into a reconcilable batch.

use std::collections::HashSet;

use shelfsync_core::{ProductKey, ResolvedProduct, StoreType};
use shelfsync_scraper::{normalize_item, RawItem};

/// Drops every item whose product key was already seen, keeping the first
/// occurrence. Items are keyed the same way the catalog keys stored rows.
///
/// The same product commonly appears under several departments. Arrival
/// order across categories is not deterministic, so "first" means first in
/// the order the fetches happened to complete.
#[must_use]
pub fn dedupe_first_seen(items: Vec<RawItem>, store_type: StoreType) -> Vec<RawItem> {
    let mut seen: HashSet<ProductKey> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(ProductKey::new(item.sku.clone(), store_type)))
        .collect()
}

/// Deduplicates, then resolves prices, dropping items that are not sellable.
///
/// Returns the batch and the number of unsellable items dropped.
#[must_use]
pub fn resolve_batch(items: Vec<RawItem>, store_type: StoreType) -> (Vec<ResolvedProduct>, usize) {
    let unique = dedupe_first_seen(items, store_type);
    let candidates = unique.len();
    let resolved: Vec<ResolvedProduct> = unique
        .into_iter()
        .filter_map(|item| normalize_item(item, store_type))
        .collect();
    let dropped = candidates - resolved.len();
    (resolved, dropped)
}
