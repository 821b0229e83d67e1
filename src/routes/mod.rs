use axum::http::{Method, Uri};
use chrono::NaiveDate;
use tracing::debug;

use crate::errors::AppError;
use crate::models::parse_iso_date;

pub(crate) mod change_points;
pub(crate) mod events;
pub(crate) mod health;
pub(crate) mod impact;
pub(crate) mod metadata;
pub(crate) mod prices;
pub(crate) mod statistics;

/// Optional ISO date query value. A blank value counts as absent.
pub(crate) fn optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_iso_date(raw).map(Some).map_err(AppError::Validation),
    }
}

pub(crate) fn required_date(value: Option<&str>, field: &str) -> Result<NaiveDate, AppError> {
    optional_date(value)?.ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

/// JSON 404 for any path no route matches.
pub(crate) async fn not_found(method: Method, uri: Uri) -> AppError {
    debug!("No route for {} {}", method, uri.path());
    AppError::NotFound(format!("no route for {} {}", method, uri.path()))
}
