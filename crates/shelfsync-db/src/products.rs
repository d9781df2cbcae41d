//! Database operations for `products` and `product_prices`.
//!
//! Write functions take any [`PgExecutor`] so callers can run a whole
//! reconciliation batch inside one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shelfsync_core::{ChangedField, ProductKey, RegionId, ResolvedProduct, StoreType};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub public_id: Uuid,
    pub sku: String,
    /// `SMALLINT` discriminant; see [`StoreType::as_i16`].
    pub store_type: i16,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub max_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// # Errors
    ///
    /// Returns [`DbError::UnknownStoreType`] if the stored discriminant is not
    /// a known [`StoreType`].
    pub fn key(&self) -> Result<ProductKey, DbError> {
        let store_type =
            StoreType::try_from(self.store_type).map_err(|e| DbError::UnknownStoreType {
                id: self.id,
                store_type: e.0,
            })?;
        Ok(ProductKey::new(self.sku.clone(), store_type))
    }
}

/// The most recent captured price for one (product, region) pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LatestPriceRow {
    pub product_id: i64,
    pub region_id: i64,
    pub price: Decimal,
    pub captured_at: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = "id, public_id, sku, store_type, name, brand, image_url, \
                               max_quantity, created_at, updated_at";

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Returns the stored rows for `skus` under `store_type`. SKUs with no row
/// are simply absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_existing_products<'e, E>(
    executor: E,
    store_type: StoreType,
    skus: &[String],
) -> Result<Vec<ProductRow>, DbError>
where
    E: PgExecutor<'e>,
{
    if skus.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE store_type = $1 AND sku = ANY($2)"
    ))
    .bind(store_type.as_i16())
    .bind(skus)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Inserts a new product row.
///
/// Returns `false` if a row with the same `(sku, store_type)` already exists;
/// the existing row is left untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_product<'e, E>(executor: E, product: &ResolvedProduct) -> Result<bool, DbError>
where
    E: PgExecutor<'e>,
{
    let rows_affected = sqlx::query(
        "INSERT INTO products \
             (public_id, sku, store_type, name, brand, image_url, max_quantity) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (sku, store_type) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(&product.sku)
    .bind(product.store_type.as_i16())
    .bind(&product.name)
    .bind(&product.brand)
    .bind(&product.image_url)
    .bind(product.max_quantity)
    .execute(executor)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Writes only the columns named in `changed`, taking new values from
/// `product`. Columns not in `changed` keep their stored values.
///
/// Returns `false` if no row matches the product's key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_product_fields<'e, E>(
    executor: E,
    product: &ResolvedProduct,
    changed: &[ChangedField],
) -> Result<bool, DbError>
where
    E: PgExecutor<'e>,
{
    if changed.is_empty() {
        return Ok(false);
    }

    let rows_affected = sqlx::query(
        "UPDATE products SET \
             name         = CASE WHEN $3 THEN $4 ELSE name END, \
             brand        = CASE WHEN $5 THEN $6 ELSE brand END, \
             image_url    = CASE WHEN $7 THEN $8 ELSE image_url END, \
             max_quantity = CASE WHEN $9 THEN $10 ELSE max_quantity END, \
             updated_at   = NOW() \
         WHERE sku = $1 AND store_type = $2",
    )
    .bind(&product.sku)
    .bind(product.store_type.as_i16())
    .bind(changed.contains(&ChangedField::Name))
    .bind(&product.name)
    .bind(changed.contains(&ChangedField::Brand))
    .bind(&product.brand)
    .bind(changed.contains(&ChangedField::ImageUrl))
    .bind(&product.image_url)
    .bind(changed.contains(&ChangedField::MaxQuantity))
    .bind(product.max_quantity)
    .execute(executor)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Case-insensitive substring search over name and brand.
///
/// `term = None` lists everything. Ordered by name then id for stable paging.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn search_products(
    pool: &PgPool,
    term: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProductRow>, DbError> {
    let pattern = term
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", escape_like(t)));

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE $1::text IS NULL \
            OR name ILIKE $1 ESCAPE '\\' \
            OR brand ILIKE $1 ESCAPE '\\' \
         ORDER BY LOWER(name), id \
         LIMIT $2 OFFSET $3"
    ))
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Escapes `LIKE` metacharacters so user input matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// ---------------------------------------------------------------------------
// product_prices operations
// ---------------------------------------------------------------------------

/// Inserts a price row for `(key, region_id)` only if it differs from the
/// most recent one.
///
/// The lookup of the last price and the conditional insert run as a single
/// statement. Returns `true` if a row was inserted; `false` if the price was
/// unchanged or no product matches `key`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the database operation fails.
pub async fn record_price_if_changed<'e, E>(
    executor: E,
    key: &ProductKey,
    region_id: RegionId,
    sync_run_id: Option<i64>,
    price: Decimal,
) -> Result<bool, DbError>
where
    E: PgExecutor<'e>,
{
    let rows_affected = sqlx::query(
        "WITH target AS ( \
             SELECT id FROM products WHERE sku = $1 AND store_type = $2 \
         ), \
         last AS ( \
             SELECT pp.price \
             FROM product_prices pp \
             JOIN target t ON t.id = pp.product_id \
             WHERE pp.region_id = $3 \
             ORDER BY pp.captured_at DESC, pp.id DESC \
             LIMIT 1 \
         ) \
         INSERT INTO product_prices (product_id, region_id, sync_run_id, price, captured_at) \
         SELECT t.id, $3, $4, $5::numeric(10,2), NOW() \
         FROM target t \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM last WHERE last.price = $5::numeric(10,2) \
         )",
    )
    .bind(&key.sku)
    .bind(key.store_type.as_i16())
    .bind(region_id.0)
    .bind(sync_run_id)
    .bind(price)
    .execute(executor)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Returns the latest price per region for each of `product_ids`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_prices_for_products(
    pool: &PgPool,
    product_ids: &[i64],
) -> Result<Vec<LatestPriceRow>, DbError> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, LatestPriceRow>(
        "SELECT DISTINCT ON (product_id, region_id) \
                product_id, region_id, price, captured_at \
         FROM product_prices \
         WHERE product_id = ANY($1) \
         ORDER BY product_id, region_id, captured_at DESC, id DESC",
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_metacharacters() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("milk"), "milk");
    }
}
