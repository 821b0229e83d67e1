use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::event::{iso_date, Event};

/// Price level shift around an event date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    #[serde(with = "iso_date")]
    pub event_date: NaiveDate,
    pub window_days: u32,
    pub price_before: f64,
    pub price_after: f64,
    pub absolute_change: f64,
    pub percentage_change: f64,
    pub before_points: usize,
    pub after_points: usize,
}

/// Outcome of an impact request whose event date lies inside the series.
///
/// `Insufficient` is a valid answer ("no conclusion"), not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImpactOutcome {
    Impact(ImpactResult),
    InsufficientData {
        before_points: usize,
        after_points: usize,
        required: usize,
    },
}

impl ImpactOutcome {
    pub fn impact(&self) -> Option<&ImpactResult> {
        match self {
            ImpactOutcome::Impact(result) => Some(result),
            ImpactOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ImpactOutcome::Impact(_) => "ok",
            ImpactOutcome::InsufficientData { .. } => "insufficient_data",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventImpactResponse {
    pub impact: Option<ImpactResult>,
    pub status: String,
    pub dates: Vec<String>,
    pub prices: Vec<f64>,
    pub event_date: String,
}

/// One row of the batch impact endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventImpactSummary {
    pub event: Event,
    pub impact: Option<ImpactResult>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventImpactsResponse {
    pub window_days: u32,
    pub results: Vec<EventImpactSummary>,
}
