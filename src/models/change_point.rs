use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::event::{iso_date, Event};

/// Contiguous range of the price series `[start_index, end_index]` assumed to
/// share one set of generative parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_index: usize,
    pub end_index: usize,
    #[serde(with = "iso_date")]
    pub start_date: NaiveDate,
    #[serde(with = "iso_date")]
    pub end_date: NaiveDate,
    pub count: usize,
    pub mean: f64,
    /// Sample variance of prices; zero for a single-point segment.
    pub variance: f64,
}

/// Posterior mass of one candidate change index.
///
/// `candidate_index` is the price index of the first point of the new regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangePointPosterior {
    pub candidate_index: usize,
    #[serde(with = "iso_date")]
    pub date: NaiveDate,
    pub probability_mass: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredibleInterval {
    pub low_index: usize,
    pub high_index: usize,
    #[serde(with = "iso_date")]
    pub low_date: NaiveDate,
    #[serde(with = "iso_date")]
    pub high_date: NaiveDate,
    /// Configured coverage target, e.g. 0.9.
    pub level: f64,
    /// Posterior mass actually contained in the interval (>= level).
    pub mass: f64,
}

/// Posterior means of the log-return regime parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeParameters {
    pub mu_before: f64,
    pub mu_after: f64,
    pub sigma_before: f64,
    pub sigma_after: f64,
    /// Fraction of retained draws with `mu_after > mu_before`.
    pub mean_increase_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangePointEstimate {
    #[serde(with = "iso_date")]
    pub point_estimate_date: NaiveDate,
    pub change_index: usize,
    pub credible_interval: CredibleInterval,
    pub before_segment: Segment,
    pub after_segment: Segment,
    pub parameters: RegimeParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerDiagnostics {
    pub chains: usize,
    pub iterations_per_chain: usize,
    pub burn_in: usize,
    pub retained_draws: usize,
    pub r_hat_tau: f64,
    pub r_hat_mu_before: f64,
    pub r_hat_mu_after: f64,
    pub max_r_hat: f64,
    pub attempts: usize,
    pub converged: bool,
}

/// Non-fatal notice that the sampler diagnostics did not pass within budget.
/// The estimate it is attached to is the best one available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    pub message: String,
    pub max_r_hat: f64,
    pub threshold: f64,
    pub attempts: usize,
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointResult {
    pub estimate: ChangePointEstimate,
    pub posterior: Vec<ChangePointPosterior>,
    pub diagnostics: SamplerDiagnostics,
    pub warning: Option<ConvergenceWarning>,
    /// Loaded events dated inside the credible interval.
    pub nearby_events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiChangePointResult {
    pub policy: String,
    pub max_change_points: usize,
    pub change_points: Vec<ChangePointResult>,
}
