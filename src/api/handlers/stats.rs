use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use super::{api_error, ApiError};
use crate::api::{state::AppState, types::*};
use crate::domain::Metric;
use crate::services::{ComparisonRow, TopHeroes};

/// GET /api/compare?mode=&input=&region=&tier=&map=&from=&to=
pub async fn compare(
    State(state): State<AppState>,
    Query(params): Query<CompareQuery>,
) -> std::result::Result<Json<Vec<ComparisonRow>>, ApiError> {
    let combination = params.combination().map_err(api_error)?;
    let (from, to) = params.window().map_err(api_error)?;

    let rows = state
        .query
        .compare(&combination, from, to)
        .await
        .map_err(api_error)?;
    Ok(Json(rows))
}

/// GET /api/top?mode=&input=&region=&tier=&map=&metric=pick_rate&limit=10&date=
pub async fn top_heroes(
    State(state): State<AppState>,
    Query(params): Query<TopQuery>,
) -> std::result::Result<Json<TopHeroes>, ApiError> {
    let combination = params.combination().map_err(api_error)?;
    let metric: Metric = params
        .metric
        .as_deref()
        .unwrap_or("pick_rate")
        .parse()
        .map_err(api_error)?;
    let as_of = params.as_of().map_err(api_error)?;
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT);

    let top = state
        .query
        .top_n(&combination, metric, limit, as_of)
        .await
        .map_err(api_error)?;
    Ok(Json(top))
}

/// GET /api/health
pub async fn health(
    State(state): State<AppState>,
) -> std::result::Result<Json<HealthResponse>, ApiError> {
    let report = state.query.health().await.map_err(api_error)?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        report,
        uptime_seconds: (Utc::now() - state.start_time).num_seconds(),
    }))
}
