use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

/// Failures of the statistical core. Each one is recovered at the component
/// boundary and turned into a structured response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("No price data between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },
    #[error("Insufficient data for {what}: need at least {required} points, got {actual}")]
    InsufficientData {
        what: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("Date {date} is outside the loaded series ({start} to {end})")]
    DateOutOfRange {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid series: {0}")]
    InvalidSeries(String),
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::EmptyRange { .. } => "empty_range",
            AnalysisError::InsufficientData { .. } => "insufficient_data",
            AnalysisError::DateOutOfRange { .. } => "date_out_of_range",
            AnalysisError::InvalidParameter(_) => "invalid_parameter",
            AnalysisError::InvalidSeries(_) => "invalid_series",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Analysis(e) => {
                let status = match e {
                    AnalysisError::EmptyRange { .. }
                    | AnalysisError::DateOutOfRange { .. }
                    | AnalysisError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
                    AnalysisError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    AnalysisError::InvalidSeries(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}
