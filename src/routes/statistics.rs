use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::PriceSummary;
use crate::routes::optional_date;
use crate::services::statistics_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_statistics))
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQueryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// GET /api/statistics?start_date=&end_date=
///
/// Fails with 400 when the range holds no prices and 422 when it holds a
/// single price.
pub async fn get_statistics(
    Query(params): Query<StatisticsQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<PriceSummary>, AppError> {
    info!(
        "GET /api/statistics - Summarizing prices (start={:?}, end={:?})",
        params.start_date, params.end_date
    );
    let start = optional_date(params.start_date.as_deref())?;
    let end = optional_date(params.end_date.as_deref())?;

    let summary = statistics_service::summarize_range(&state.store, &state.summary_cache, start, end)
        .map_err(|e| {
            warn!("Statistics request rejected: {}", e);
            AppError::from(e)
        })?;
    Ok(Json(summary))
}
