use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use crate::models::{format_date, CategoriesResponse, DateRangeResponse};
use crate::services::query_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(get_categories))
        .route("/date-range", get(get_date_range))
}

/// GET /api/categories
pub async fn get_categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    info!("GET /api/categories - Listing event categories");
    Json(query_service::categories(&state.store))
}

/// GET /api/date-range
pub async fn get_date_range(State(state): State<AppState>) -> Json<DateRangeResponse> {
    info!("GET /api/date-range - Getting series bounds");
    let (start, end) = state.store.date_range();
    Json(DateRangeResponse {
        start_date: format_date(start),
        end_date: format_date(end),
    })
}
