use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::errors::{AnalysisError, AppError};
use crate::models::{ChangePointResult, MultiChangePointResult};
use crate::routes::optional_date;
use crate::services::change_point_service;
use crate::state::AppState;

const DEFAULT_MAX_CHANGE_POINTS: usize = 3;
const MAX_CHANGE_POINTS_LIMIT: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/change-point", get(get_change_point))
        .route("/change-points", get(get_change_points))
}

#[derive(Debug, Deserialize)]
pub struct ChangePointQueryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub max_change_points: Option<usize>,
}

fn log_failure(context: &str, e: &AnalysisError) {
    match e {
        AnalysisError::InsufficientData { .. } | AnalysisError::EmptyRange { .. } => {
            warn!("{}: {}", context, e)
        }
        _ => error!("{}: {}", context, e),
    }
}

/// GET /api/change-point?start_date=&end_date=
///
/// Single change-point fit over the full series unless a range is given. A
/// fit that misses the convergence threshold still returns its estimate,
/// with `warning` set.
pub async fn get_change_point(
    Query(params): Query<ChangePointQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<ChangePointResult>, AppError> {
    info!(
        "GET /api/change-point - Detecting change point (start={:?}, end={:?})",
        params.start_date, params.end_date
    );
    let start = optional_date(params.start_date.as_deref())?;
    let end = optional_date(params.end_date.as_deref())?;

    let store = state.store.clone();
    let detector = state.detector.clone();
    let result = tokio::task::spawn_blocking(move || {
        change_point_service::detect_change_point(&store, &detector, start, end)
    })
    .await
    .map_err(|e| {
        error!("Change-point task failed: {}", e);
        AppError::Internal(e.to_string())
    })?
    .map_err(|e| {
        log_failure("Change-point detection failed", &e);
        AppError::from(e)
    })?;

    if let Some(warning) = &result.warning {
        warn!("Returning unconverged change point: {}", warning.message);
    }
    Ok(Json(result))
}

/// GET /api/change-points?max_change_points=3&start_date=&end_date=
pub async fn get_change_points(
    Query(params): Query<ChangePointQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<MultiChangePointResult>, AppError> {
    info!(
        "GET /api/change-points - Segmenting series (max={:?}, start={:?}, end={:?})",
        params.max_change_points, params.start_date, params.end_date
    );
    let max_change_points = params.max_change_points.unwrap_or(DEFAULT_MAX_CHANGE_POINTS);
    if !(1..=MAX_CHANGE_POINTS_LIMIT).contains(&max_change_points) {
        return Err(AppError::Validation(format!(
            "max_change_points must be between 1 and {}",
            MAX_CHANGE_POINTS_LIMIT
        )));
    }
    let start = optional_date(params.start_date.as_deref())?;
    let end = optional_date(params.end_date.as_deref())?;

    let store = state.store.clone();
    let detector = state.detector.clone();
    let result = tokio::task::spawn_blocking(move || {
        change_point_service::detect_change_points(&store, &detector, max_change_points, start, end)
    })
    .await
    .map_err(|e| {
        error!("Segmentation task failed: {}", e);
        AppError::Internal(e.to_string())
    })?
    .map_err(|e| {
        log_failure("Change-point segmentation failed", &e);
        AppError::from(e)
    })?;

    info!("Found {} change points", result.change_points.len());
    Ok(Json(result))
}
