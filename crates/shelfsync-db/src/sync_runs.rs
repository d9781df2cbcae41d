//! Database operations for `sync_runs` and `sync_run_regions`.

use chrono::{DateTime, Utc};
use shelfsync_core::Region;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub regions_total: i32,
    pub regions_failed: i32,
    pub products_inserted: i32,
    pub products_updated: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `sync_run_regions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunRegionRow {
    pub id: i64,
    pub sync_run_id: i64,
    pub region_id: i64,
    pub region_name: String,
    pub status: String,
    pub items_fetched: i32,
    pub products_inserted: i32,
    pub products_updated: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters written when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub regions_total: i32,
    pub regions_failed: i32,
    pub products_inserted: i32,
    pub products_updated: i32,
}

const RUN_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
                           regions_total, regions_failed, products_inserted, products_updated, \
                           error_message, created_at";

// ---------------------------------------------------------------------------
// sync_runs operations
// ---------------------------------------------------------------------------

/// Creates a new sync run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_run(pool: &PgPool, trigger_source: &str) -> Result<SyncRunRow, DbError> {
    let row = sqlx::query_as::<_, SyncRunRow>(&format!(
        "INSERT INTO sync_runs (public_id, trigger_source, status) \
         VALUES ($1, $2, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `queued`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_sync_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and records its totals.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_sync_run(pool: &PgPool, id: i64, totals: RunTotals) -> Result<(), DbError> {
    finish_sync_run(pool, id, "succeeded", totals, None).await
}

/// Marks a run as `cancelled`, keeping whatever totals were reached.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn cancel_sync_run(pool: &PgPool, id: i64, totals: RunTotals) -> Result<(), DbError> {
    finish_sync_run(pool, id, "cancelled", totals, Some("cancelled before completion")).await
}

/// Marks a run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_sync_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    finish_sync_run(pool, id, "failed", RunTotals::default(), Some(error_message)).await
}

async fn finish_sync_run(
    pool: &PgPool,
    id: i64,
    status: &str,
    totals: RunTotals,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = $1, completed_at = NOW(), \
             regions_total = $2, regions_failed = $3, \
             products_inserted = $4, products_updated = $5, \
             error_message = $6 \
         WHERE id = $7 AND status = 'running'",
    )
    .bind(status)
    .bind(totals.regions_total)
    .bind(totals.regions_failed)
    .bind(totals.products_inserted)
    .bind(totals.products_updated)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_run(pool: &PgPool, id: i64) -> Result<SyncRunRow, DbError> {
    let row = sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_runs(pool: &PgPool, limit: i64) -> Result<Vec<SyncRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM sync_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// sync_run_regions operations
// ---------------------------------------------------------------------------

/// Inserts or replaces the per-region outcome row for a run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
#[allow(clippy::too_many_arguments)]
pub async fn record_sync_run_region(
    pool: &PgPool,
    run_id: i64,
    region: &Region,
    status: &str,
    items_fetched: i32,
    products_inserted: i32,
    products_updated: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sync_run_regions \
             (sync_run_id, region_id, region_name, status, items_fetched, \
              products_inserted, products_updated, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (sync_run_id, region_id) DO UPDATE SET \
             status            = EXCLUDED.status, \
             items_fetched     = EXCLUDED.items_fetched, \
             products_inserted = EXCLUDED.products_inserted, \
             products_updated  = EXCLUDED.products_updated, \
             error_message     = EXCLUDED.error_message",
    )
    .bind(run_id)
    .bind(region.id.0)
    .bind(&region.name)
    .bind(status)
    .bind(items_fetched)
    .bind(products_inserted)
    .bind(products_updated)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all per-region outcome rows for a run, in region id order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_run_regions(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<SyncRunRegionRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunRegionRow>(
        "SELECT id, sync_run_id, region_id, region_name, status, items_fetched, \
                products_inserted, products_updated, error_message, created_at \
         FROM sync_run_regions \
         WHERE sync_run_id = $1 \
         ORDER BY region_id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
