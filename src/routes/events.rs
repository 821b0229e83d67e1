use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::{EventFilter, EventsResponse};
use crate::routes::optional_date;
use crate::services::query_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_events))
}

/// Event filters shared by the event listing and batch impact endpoints.
/// An omitted `category` is no constraint; `category=` matches events with
/// an empty category.
#[derive(Debug, Default, Deserialize)]
pub struct EventQueryParams {
    pub category: Option<String>,
    pub impact_level: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl EventQueryParams {
    pub fn to_filter(&self) -> Result<EventFilter, AppError> {
        Ok(EventFilter {
            category: self.category.clone(),
            impact_level: self.impact_level.clone(),
            start_date: optional_date(self.start_date.as_deref())?,
            end_date: optional_date(self.end_date.as_deref())?,
        })
    }
}

/// GET /api/events?category=&impact_level=&start_date=&end_date=
pub async fn get_events(
    Query(params): Query<EventQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<EventsResponse>, AppError> {
    info!("GET /api/events - Filtering events ({:?})", params);
    let filter = params.to_filter()?;
    let events = query_service::filter_events(&state.store, &filter);
    info!("Returning {} events", events.len());
    Ok(Json(EventsResponse { events }))
}
