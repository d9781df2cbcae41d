use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shelfsync_core::RegionId;
use shelfsync_db::{LatestPriceRow, ProductRow};
use shelfsync_sync::RegionalProduct;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_sync_error, normalize_limit, normalize_offset, ApiError, ApiResponse,
    AppState,
};

const MAX_SEARCH_REGIONS: usize = 50;

#[derive(Debug, Deserialize, Default)]
pub(super) struct ProductListQuery {
    pub term: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct LiveSearchQuery {
    pub term: Option<String>,
    /// Comma-separated region ids, e.g. `1,2,3`.
    pub region_ids: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct RegionPriceItem {
    region_id: i64,
    price: Decimal,
    captured_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: Uuid,
    sku: String,
    store_type: String,
    name: String,
    brand: Option<String>,
    image_url: Option<String>,
    max_quantity: i32,
    updated_at: DateTime<Utc>,
    prices: Vec<RegionPriceItem>,
}

impl ProductItem {
    fn from_row(row: ProductRow, prices: Vec<RegionPriceItem>) -> Self {
        let store_type = row
            .key()
            .map_or_else(|_| row.store_type.to_string(), |key| key.store_type.to_string());
        Self {
            id: row.public_id,
            sku: row.sku,
            store_type,
            name: row.name,
            brand: row.brand,
            image_url: row.image_url,
            max_quantity: row.max_quantity,
            updated_at: row.updated_at,
            prices,
        }
    }
}

/// Stored catalog, each product with the latest price captured per region.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let limit = normalize_limit(query.limit);
    let offset = normalize_offset(query.offset);

    let rows = shelfsync_db::search_products(&state.pool, query.term.as_deref(), limit, offset)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let latest = shelfsync_db::latest_prices_for_products(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let mut prices = group_prices(latest);
    let items = rows
        .into_iter()
        .map(|row| {
            let product_prices = prices.remove(&row.id).unwrap_or_default();
            ProductItem::from_row(row, product_prices)
        })
        .collect();

    Ok(ApiResponse::new(items, req_id.0))
}

fn group_prices(rows: Vec<LatestPriceRow>) -> HashMap<i64, Vec<RegionPriceItem>> {
    let mut grouped: HashMap<i64, Vec<RegionPriceItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.product_id).or_default().push(RegionPriceItem {
            region_id: row.region_id,
            price: row.price,
            captured_at: row.captured_at,
        });
    }
    for prices in grouped.values_mut() {
        prices.sort_by_key(|p| p.region_id);
    }
    grouped
}

/// Live search against the retailer, one session per requested region.
/// Nothing is persisted.
pub(super) async fn search_live(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LiveSearchQuery>,
) -> Result<Json<ApiResponse<Vec<RegionalProduct>>>, ApiError> {
    let term = query.term.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "term is required",
        ));
    }

    let region_ids = parse_region_ids(query.region_ids.as_deref().unwrap_or_default())
        .map_err(|message| ApiError::new(req_id.0.clone(), "validation_error", message))?;

    let products = state
        .engine
        .search_by_term(term, &region_ids, state.shutdown.child_token())
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(products, req_id.0))
}

/// Parses `1,2,3`, keeping first-seen order and dropping repeats.
pub(super) fn parse_region_ids(raw: &str) -> Result<Vec<RegionId>, String> {
    let mut ids: Vec<RegionId> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
            .parse::<i64>()
            .map_err(|_| format!("region_ids contains a non-numeric id: {part}"))?;
        let id = RegionId(id);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if ids.is_empty() {
        return Err("region_ids must name at least one region".to_owned());
    }
    if ids.len() > MAX_SEARCH_REGIONS {
        return Err(format!(
            "region_ids may name at most {MAX_SEARCH_REGIONS} regions"
        ));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_region_ids_keeps_order_and_drops_repeats() {
        let ids = parse_region_ids("3, 1,3,,2").unwrap();
        assert_eq!(ids, vec![RegionId(3), RegionId(1), RegionId(2)]);
    }

    #[test]
    fn parse_region_ids_rejects_empty_and_garbage() {
        assert!(parse_region_ids("").is_err());
        assert!(parse_region_ids(" , ").is_err());
        let err = parse_region_ids("1,two").unwrap_err();
        assert!(err.contains("two"));
    }

    #[test]
    fn parse_region_ids_caps_the_region_count() {
        let raw: Vec<String> = (1..=51).map(|i| i.to_string()).collect();
        assert!(parse_region_ids(&raw.join(",")).is_err());
    }

    #[test]
    fn group_prices_buckets_by_product_in_region_order() {
        let now = Utc::now();
        let row = |product_id, region_id, cents| LatestPriceRow {
            product_id,
            region_id,
            price: Decimal::new(cents, 2),
            captured_at: now,
        };
        let grouped = group_prices(vec![row(1, 9, 450), row(2, 1, 100), row(1, 4, 500)]);

        let first: Vec<i64> = grouped[&1].iter().map(|p| p.region_id).collect();
        assert_eq!(first, vec![4, 9]);
        assert_eq!(grouped[&2][0].price, Decimal::new(100, 2));
    }
}
