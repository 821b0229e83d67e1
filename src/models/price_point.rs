use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Represents one daily closing price of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Parallel-array shape used by the price endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSeriesResponse {
    pub dates: Vec<String>,
    pub prices: Vec<f64>,
}

impl PriceSeriesResponse {
    pub fn from_points(points: &[PricePoint]) -> Self {
        Self {
            dates: points.iter().map(|p| format_date(p.date)).collect(),
            prices: points.iter().map(|p| p.price).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateRangeResponse {
    pub start_date: String,
    pub end_date: String,
}

/// ISO 8601 calendar date, the only date format used on the wire.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD", value))
}
