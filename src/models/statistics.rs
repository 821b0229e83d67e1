use serde::{Deserialize, Serialize};

/// Descriptive statistics over a contiguous range of the price series.
///
/// `volatility` is the annualized sample standard deviation of daily log
/// returns (252 trading days).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub mean: f64,
    pub median: f64,
    #[serde(rename = "std")]
    pub std_dev: f64,
    pub volatility: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}
