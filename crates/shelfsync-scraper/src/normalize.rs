//! Conversion from a [`RawItem`] to a persistable [`ResolvedProduct`].
//!
//! Price resolution happens here; items the retailer cannot sell are dropped.

use shelfsync_core::{ResolvedProduct, StoreType};

use crate::price::{resolve_price, PriceResolution};
use crate::types::RawItem;

/// Resolves the price of `item` and converts it into a [`ResolvedProduct`].
///
/// Returns `None` when the item is not sellable.
#[must_use]
pub fn normalize_item(item: RawItem, store_type: StoreType) -> Option<ResolvedProduct> {
    let PriceResolution::Sellable(price) = resolve_price(&item.price) else {
        tracing::trace!(sku = %item.sku, "dropping item with no sellable price");
        return None;
    };

    Some(ResolvedProduct {
        sku: item.sku,
        store_type,
        name: item.name.trim().to_owned(),
        brand: item.brand,
        image_url: item.image_url,
        max_quantity: max_quantity(item.max_quantity),
        price,
    })
}

/// Truncates the retailer's fractional maximum toward zero, clamped to `i32`.
/// An absent or non-finite maximum becomes 0.
#[allow(clippy::cast_possible_truncation)]
fn max_quantity(raw: Option<f64>) -> i32 {
    match raw {
        Some(value) if value.is_finite() => value.trunc().clamp(0.0, f64::from(i32::MAX)) as i32,
        _ => 0,
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
