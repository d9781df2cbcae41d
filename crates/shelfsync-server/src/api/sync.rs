use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_db::{SyncRunRegionRow, SyncRunRow};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::products::parse_region_ids;
use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize, Default)]
pub(super) struct TriggerQuery {
    /// Optional comma-separated region ids; absent means every allowed region.
    pub region_ids: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RunListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct TriggerAccepted {
    started: bool,
    trigger_source: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunItem {
    id: i64,
    public_id: Uuid,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    regions_total: i32,
    regions_failed: i32,
    products_inserted: i32,
    products_updated: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SyncRunRow> for SyncRunItem {
    fn from(row: SyncRunRow) -> Self {
        Self {
            id: row.id,
            public_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            regions_total: row.regions_total,
            regions_failed: row.regions_failed,
            products_inserted: row.products_inserted,
            products_updated: row.products_updated,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunRegionItem {
    region_id: i64,
    region_name: String,
    status: String,
    items_fetched: i32,
    products_inserted: i32,
    products_updated: i32,
    error_message: Option<String>,
}

impl From<SyncRunRegionRow> for SyncRunRegionItem {
    fn from(row: SyncRunRegionRow) -> Self {
        Self {
            region_id: row.region_id,
            region_name: row.region_name,
            status: row.status,
            items_fetched: row.items_fetched,
            products_inserted: row.products_inserted,
            products_updated: row.products_updated,
            error_message: row.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunDetail {
    #[serde(flatten)]
    run: SyncRunItem,
    regions: Vec<SyncRunRegionItem>,
}

/// Starts a background sync. `409` while another run is active.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TriggerQuery>,
) -> Result<(StatusCode, Json<ApiResponse<TriggerAccepted>>), ApiError> {
    let regions = query
        .region_ids
        .as_deref()
        .map(parse_region_ids)
        .transpose()
        .map_err(|message| ApiError::new(req_id.0.clone(), "validation_error", message))?;

    if !state.runner.try_start("api", regions) {
        return Err(ApiError::new(
            req_id.0,
            "conflict",
            "a sync run is already in progress",
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        ApiResponse::new(
            TriggerAccepted {
                started: true,
                trigger_source: "api",
            },
            req_id.0,
        ),
    ))
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunListQuery>,
) -> Result<Json<ApiResponse<Vec<SyncRunItem>>>, ApiError> {
    let limit = normalize_limit(query.limit);
    let rows = shelfsync_db::list_sync_runs(&state.pool, limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let items = rows.into_iter().map(SyncRunItem::from).collect();
    Ok(ApiResponse::new(items, req_id.0))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<i64>,
) -> Result<Json<ApiResponse<SyncRunDetail>>, ApiError> {
    let run = shelfsync_db::get_sync_run(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let regions = shelfsync_db::list_sync_run_regions(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let detail = SyncRunDetail {
        run: run.into(),
        regions: regions.into_iter().map(SyncRunRegionItem::from).collect(),
    };
    Ok(ApiResponse::new(detail, req_id.0))
}
