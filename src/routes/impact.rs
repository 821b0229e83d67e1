use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{format_date, EventImpactResponse, EventImpactsResponse};
use crate::routes::events::EventQueryParams;
use crate::routes::required_date;
use crate::services::impact_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/event-impact", get(get_event_impact))
        .route("/event-impacts", get(get_event_impacts))
}

#[derive(Debug, Deserialize)]
pub struct ImpactQueryParams {
    pub event_date: Option<String>,
    pub window_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchImpactQueryParams {
    pub window_days: Option<i64>,
    pub category: Option<String>,
    pub impact_level: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl BatchImpactQueryParams {
    fn event_filter(self) -> EventQueryParams {
        EventQueryParams {
            category: self.category,
            impact_level: self.impact_level,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

fn resolve_window(requested: Option<i64>, default: u32) -> Result<u32, AppError> {
    let window = requested.unwrap_or(i64::from(default));
    if !(1..=i64::from(impact_service::MAX_WINDOW_DAYS)).contains(&window) {
        return Err(AppError::Validation(format!(
            "window_days must be between 1 and {}, got {}",
            impact_service::MAX_WINDOW_DAYS,
            window
        )));
    }
    u32::try_from(window).map_err(|_| AppError::Validation(format!("window_days out of range: {}", window)))
}

/// GET /api/event-impact?event_date=YYYY-MM-DD&window_days=30
///
/// `impact` is null with `status: "insufficient_data"` when either side of
/// the event has too few prices. Dates outside the series are a 400.
pub async fn get_event_impact(
    Query(params): Query<ImpactQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<EventImpactResponse>, AppError> {
    info!(
        "GET /api/event-impact - Computing impact (event_date={:?}, window_days={:?})",
        params.event_date, params.window_days
    );
    let event_date = required_date(params.event_date.as_deref(), "event_date")?;
    let window_days = resolve_window(params.window_days, state.default_window_days)?;

    let outcome = impact_service::impact(&state.store, event_date, window_days, state.impact_min_points)
        .map_err(|e| {
            error!("Failed to compute impact for {}: {}", event_date, e);
            AppError::from(e)
        })?;

    let surrounding = impact_service::surrounding_prices(&state.store, event_date, window_days);
    Ok(Json(EventImpactResponse {
        impact: outcome.impact().copied(),
        status: outcome.status().to_string(),
        dates: surrounding.iter().map(|p| format_date(p.date)).collect(),
        prices: surrounding.iter().map(|p| p.price).collect(),
        event_date: format_date(event_date),
    }))
}

/// GET /api/event-impacts?window_days=30&category=&impact_level=&start_date=&end_date=
///
/// Impact of every matching event.
pub async fn get_event_impacts(
    Query(params): Query<BatchImpactQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<EventImpactsResponse>, AppError> {
    info!("GET /api/event-impacts - Computing batch impacts ({:?})", params);
    let window_days = resolve_window(params.window_days, state.default_window_days)?;
    let filter = params.event_filter().to_filter()?;

    let results = impact_service::impacts_for_events(&state.store, &filter, window_days, state.impact_min_points)
        .map_err(|e| {
            error!("Failed to compute batch impacts: {}", e);
            AppError::from(e)
        })?;
    info!("Computed impact for {} events", results.len());
    Ok(Json(EventImpactsResponse { window_days, results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_window() {
        assert_eq!(resolve_window(None, 30).unwrap(), 30);
        assert_eq!(resolve_window(Some(3650), 30).unwrap(), 3650);
        assert!(resolve_window(Some(0), 30).is_err());
        assert!(resolve_window(Some(-7), 30).is_err());
        assert!(resolve_window(Some(3651), 30).is_err());
    }
}
