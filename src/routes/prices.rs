use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::PriceSeriesResponse;
use crate::routes::optional_date;
use crate::services::query_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_prices))
}

#[derive(Debug, Deserialize)]
pub struct PriceQueryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// GET /api/prices?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD
///
/// Parallel `dates`/`prices` arrays in ascending date order. An empty range
/// yields empty arrays.
pub async fn get_prices(
    Query(params): Query<PriceQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<PriceSeriesResponse>, AppError> {
    info!(
        "GET /api/prices - Getting prices (start={:?}, end={:?})",
        params.start_date, params.end_date
    );
    let start = optional_date(params.start_date.as_deref())?;
    let end = optional_date(params.end_date.as_deref())?;

    let points = query_service::filter_prices(&state.store, start, end);
    Ok(Json(PriceSeriesResponse::from_points(points)))
}
