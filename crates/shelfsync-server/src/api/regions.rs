use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use shelfsync_core::{Category, Region, RegionId};

use crate::middleware::RequestId;

use super::{map_sync_error, ApiError, ApiResponse, AppState};

/// What a region selection resolved to. Session tokens never leave the
/// server.
#[derive(Debug, Serialize)]
pub(super) struct SessionProbe {
    region_id: RegionId,
    address: Option<String>,
}

pub(super) async fn list_regions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Region>>>, ApiError> {
    let regions = state
        .engine
        .list_regions()
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(regions, req_id.0))
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = state
        .engine
        .get_categories()
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(categories, req_id.0))
}

pub(super) async fn probe_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(region_id): Path<i64>,
) -> Result<Json<ApiResponse<SessionProbe>>, ApiError> {
    let session = state
        .engine
        .client()
        .acquire_session(RegionId(region_id))
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e.into()))?;

    let probe = SessionProbe {
        region_id: session.region_id(),
        address: session.address().map(str::to_owned),
    };
    Ok(ApiResponse::new(probe, req_id.0))
}
