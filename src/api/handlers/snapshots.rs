use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{api_error, ApiError};
use crate::api::{state::AppState, types::*};
use crate::domain::{Snapshot, SnapshotId, SnapshotSummary};

/// GET /api/snapshots?mode=&input=&region=&tier=&map=&limit=
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(params): Query<SnapshotQuery>,
) -> std::result::Result<Json<Vec<SnapshotSummary>>, ApiError> {
    let filter = params.to_filter().map_err(api_error)?;
    let snapshots = state.query.list_snapshots(&filter).await.map_err(api_error)?;
    Ok(Json(snapshots))
}

/// GET /api/stats/:id
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<SnapshotId>,
) -> std::result::Result<Json<Snapshot>, ApiError> {
    let snapshot = state.query.snapshot(id).await.map_err(api_error)?;
    Ok(Json(snapshot))
}
