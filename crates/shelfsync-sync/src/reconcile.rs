//! Minimal-write diff between a fresh batch and stored products.
//!
//! Pure: no I/O. Stored products absent from the fresh batch are never
//! touched.

use std::collections::HashMap;

use serde::Serialize;
use shelfsync_core::{ChangedField, ProductKey, ResolvedProduct};

/// The tracked fields of a persisted product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredProduct {
    pub key: ProductKey,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub max_quantity: i32,
}

impl From<&ResolvedProduct> for StoredProduct {
    fn from(product: &ResolvedProduct) -> Self {
        Self {
            key: product.key(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            image_url: product.image_url.clone(),
            max_quantity: product.max_quantity,
        }
    }
}

/// An update for one stored product: new values plus the fields that differ.
/// Only the fields in `changed` are written.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpdate {
    pub product: ResolvedProduct,
    pub changed: Vec<ChangedField>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub to_insert: Vec<ResolvedProduct>,
    pub to_update: Vec<ProductUpdate>,
    /// Fresh products identical to their stored row.
    pub unchanged: usize,
}

impl ReconcilePlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty()
    }
}

/// Tracked fields that differ between `stored` and `fresh`, in a fixed order.
#[must_use]
pub fn changed_fields(stored: &StoredProduct, fresh: &ResolvedProduct) -> Vec<ChangedField> {
    let mut changed = Vec::new();
    if stored.name != fresh.name {
        changed.push(ChangedField::Name);
    }
    if stored.brand != fresh.brand {
        changed.push(ChangedField::Brand);
    }
    if stored.image_url != fresh.image_url {
        changed.push(ChangedField::ImageUrl);
    }
    if stored.max_quantity != fresh.max_quantity {
        changed.push(ChangedField::MaxQuantity);
    }
    changed
}

/// Splits `fresh` into inserts and field-level updates against `existing`.
///
/// `fresh` is expected to be deduplicated already.
#[must_use]
pub fn reconcile(
    fresh: &[ResolvedProduct],
    existing: &HashMap<ProductKey, StoredProduct>,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for product in fresh {
        match existing.get(&product.key()) {
            None => plan.to_insert.push(product.clone()),
            Some(stored) => {
                let changed = changed_fields(stored, product);
                if changed.is_empty() {
                    plan.unchanged += 1;
                } else {
                    plan.to_update.push(ProductUpdate {
                        product: product.clone(),
                        changed,
                    });
                }
            }
        }
    }

    plan
}
