use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::errors::AnalysisError;
use crate::models::{
    ChangePointEstimate, ChangePointPosterior, ChangePointResult, ConvergenceWarning,
    CredibleInterval, EventFilter, MultiChangePointResult, PricePoint, RegimeParameters,
    SamplerDiagnostics,
};
use crate::services::indicators;
use crate::services::mcmc::{self, Param, SamplerConfig, SamplerRun};
use crate::services::query_service;
use crate::services::statistics_service;
use crate::store::SeriesStore;

pub const SEGMENTATION_POLICY: &str = "binary_segmentation_bic";

/// Change-point detector settings
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub sampler: SamplerConfig,
    /// Coverage of the reported credible interval, e.g. 0.9.
    pub credible_mass: f64,
    /// Fewest log returns a fit accepts.
    pub min_returns: usize,
    /// Fewest log returns on each side of an accepted split when segmenting.
    pub min_segment_returns: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            credible_mass: 0.9,
            min_returns: 10,
            min_segment_returns: 30,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.sampler.validate()?;
        if !(self.credible_mass > 0.0 && self.credible_mass <= 1.0) {
            return Err("credible mass must be in (0, 1]".to_string());
        }
        if self.min_returns < 2 {
            return Err("change-point fits need at least 2 returns".to_string());
        }
        if self.min_segment_returns == 0 {
            return Err("minimum segment length must be positive".to_string());
        }
        Ok(())
    }
}

/// Fit the single change-point model to the inclusive date range (full series
/// by default) and attach the events dated inside the credible interval.
pub fn detect_change_point(
    store: &SeriesStore,
    config: &DetectorConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<ChangePointResult, AnalysisError> {
    let (lo, hi) = resolve_range(store, start, end)?;
    info!(
        "Detecting change point over {} prices ({} to {})",
        hi - lo + 1,
        store.prices()[lo].date,
        store.prices()[hi].date
    );

    let mut result = fit_segment(store.prices(), lo, hi, config)?;
    attach_events(store, &mut result);
    Ok(result)
}

/// Recursive binary segmentation: split the segment with the largest BIC gain
/// until `max_change_points` are accepted or no split improves BIC while
/// leaving `min_segment_returns` returns on both sides.
pub fn detect_change_points(
    store: &SeriesStore,
    config: &DetectorConfig,
    max_change_points: usize,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<MultiChangePointResult, AnalysisError> {
    let (lo, hi) = resolve_range(store, start, end)?;
    let prices = store.prices();

    let mut candidates: Vec<Candidate> = Vec::new();
    // The whole-range fit surfaces its errors; sub-segment failures only end that branch.
    let root = fit_segment(prices, lo, hi, config)?;
    if let Some(candidate) = Candidate::evaluate(prices, lo, hi, root, config) {
        candidates.push(candidate);
    }

    let mut accepted: Vec<ChangePointResult> = Vec::new();
    while accepted.len() < max_change_points {
        let Some(best) = candidates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.bic_gain.total_cmp(&b.bic_gain))
            .map(|(i, _)| i)
        else {
            break;
        };
        let candidate = candidates.swap_remove(best);
        let split = candidate.result.estimate.change_index;
        debug!(
            "Accepted change point at {} (BIC gain {:.2})",
            candidate.result.estimate.point_estimate_date, candidate.bic_gain
        );

        for (a, b) in [(candidate.lo, split - 1), (split, candidate.hi)] {
            // A child shorter than two minimum segments can never be split.
            if b - a < 2 * config.min_segment_returns || b - a < config.min_returns {
                continue;
            }
            match fit_segment(prices, a, b, config) {
                Ok(result) => {
                    if let Some(child) = Candidate::evaluate(prices, a, b, result, config) {
                        candidates.push(child);
                    }
                }
                Err(e) => debug!("Skipping sub-segment [{}, {}]: {}", a, b, e),
            }
        }
        accepted.push(candidate.result);
    }

    accepted.sort_by_key(|r| r.estimate.change_index);
    for result in accepted.iter_mut() {
        attach_events(store, result);
    }

    info!("Binary segmentation accepted {} change points", accepted.len());
    Ok(MultiChangePointResult {
        policy: SEGMENTATION_POLICY.to_string(),
        max_change_points,
        change_points: accepted,
    })
}

struct Candidate {
    lo: usize,
    hi: usize,
    bic_gain: f64,
    result: ChangePointResult,
}

impl Candidate {
    fn evaluate(
        prices: &[PricePoint],
        lo: usize,
        hi: usize,
        result: ChangePointResult,
        config: &DetectorConfig,
    ) -> Option<Self> {
        let values: Vec<f64> = prices[lo..=hi].iter().map(|p| p.price).collect();
        let returns = indicators::log_returns(&values);
        let tau = result.estimate.change_index - lo - 1;
        let min = config.min_segment_returns;
        if tau < min || returns.len() - tau < min {
            debug!("Split at {} leaves a side shorter than {} returns", tau, min);
            return None;
        }
        let gain = bic_gain(&returns, tau);
        (gain > 0.0).then_some(Self {
            lo,
            hi,
            bic_gain: gain,
            result,
        })
    }
}

/// BIC(one regime) - BIC(two regimes split after `tau` returns), using
/// maximum-likelihood Normal fits. Positive favours the split.
pub fn bic_gain(returns: &[f64], tau: usize) -> f64 {
    let n = returns.len() as f64;
    let one = -2.0 * normal_mle_log_lik(returns) + 2.0 * n.ln();
    let two = -2.0 * (normal_mle_log_lik(&returns[..tau]) + normal_mle_log_lik(&returns[tau..]))
        + 5.0 * n.ln();
    one - two
}

fn normal_mle_log_lik(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = indicators::mean(values).unwrap_or(0.0);
    let var = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).max(1e-12);
    -0.5 * n * ((2.0 * std::f64::consts::PI * var).ln() + 1.0)
}

fn resolve_range(
    store: &SeriesStore,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(usize, usize), AnalysisError> {
    let (lo, hi) = store.index_range(start, end);
    if lo >= hi {
        return Err(AnalysisError::EmptyRange {
            start: start.unwrap_or_else(|| store.first_date()),
            end: end.unwrap_or_else(|| store.last_date()),
        });
    }
    Ok((lo, hi - 1))
}

/// Fit prices `[lo, hi]` (inclusive) and reduce the draws to an estimate.
fn fit_segment(
    prices: &[PricePoint],
    lo: usize,
    hi: usize,
    config: &DetectorConfig,
) -> Result<ChangePointResult, AnalysisError> {
    let slice = &prices[lo..=hi];
    let values: Vec<f64> = slice.iter().map(|p| p.price).collect();
    let returns = indicators::log_returns(&values);
    if returns.len() < config.min_returns {
        return Err(AnalysisError::InsufficientData {
            what: "change point detection",
            required: config.min_returns,
            actual: returns.len(),
        });
    }

    let seeded = SamplerConfig {
        seed: config.sampler.seed ^ (lo as u64).rotate_left(20),
        ..config.sampler.clone()
    };
    let run = mcmc::run_sampler(&returns, &seeded)?;
    reduce(prices, lo, hi, returns.len(), &run, config)
}

/// Collapse pooled draws into the posterior PMF, mode, credible interval,
/// segment summaries and diagnostics.
fn reduce(
    prices: &[PricePoint],
    lo: usize,
    hi: usize,
    n_returns: usize,
    run: &SamplerRun,
    config: &DetectorConfig,
) -> Result<ChangePointResult, AnalysisError> {
    let taus = run.pooled_tau();
    if taus.is_empty() {
        return Err(AnalysisError::InvalidSeries("sampler retained no draws".to_string()));
    }

    let pmf = tau_pmf(&taus, n_returns);
    let tau = mode(&pmf);
    let (low_tau, high_tau, mass) = credible_interval(&pmf, config.credible_mass);

    // tau returns in the first regime -> the new regime starts at price tau + 1.
    let to_index = |t: usize| lo + t + 1;
    let change_index = to_index(tau);

    let posterior: Vec<ChangePointPosterior> = pmf
        .iter()
        .enumerate()
        .filter(|(_, &m)| m > 0.0)
        .map(|(t, &m)| ChangePointPosterior {
            candidate_index: to_index(t),
            date: prices[to_index(t)].date,
            probability_mass: m,
        })
        .collect();

    let before_segment = statistics_service::describe_segment(prices, lo, change_index - 1)?;
    let after_segment = statistics_service::describe_segment(prices, change_index, hi)?;

    let credible_interval = CredibleInterval {
        low_index: to_index(low_tau),
        high_index: to_index(high_tau),
        low_date: prices[to_index(low_tau)].date,
        high_date: prices[to_index(high_tau)].date,
        level: config.credible_mass,
        mass,
    };

    let diagnostics = SamplerDiagnostics {
        chains: run.chains.len(),
        iterations_per_chain: run.iterations_per_chain,
        burn_in: run.burn_in(),
        retained_draws: run.retained_draws(),
        r_hat_tau: run.convergence.r_hat_tau,
        r_hat_mu_before: run.convergence.r_hat_mu_before,
        r_hat_mu_after: run.convergence.r_hat_mu_after,
        max_r_hat: run.convergence.max_r_hat,
        attempts: run.attempts,
        converged: run.convergence.converged,
    };

    let warning = (!run.convergence.converged).then(|| {
        let message = if run.budget_exhausted {
            "time budget exhausted before the chains converged; estimate is best-effort"
        } else {
            "chains did not converge within the retry budget; estimate is best-effort"
        };
        warn!("{} (max R-hat {:.3})", message, run.convergence.max_r_hat);
        ConvergenceWarning {
            message: message.to_string(),
            max_r_hat: run.convergence.max_r_hat,
            threshold: config.sampler.rhat_threshold,
            attempts: run.attempts,
            budget_exhausted: run.budget_exhausted,
        }
    });

    Ok(ChangePointResult {
        estimate: ChangePointEstimate {
            point_estimate_date: prices[change_index].date,
            change_index,
            credible_interval,
            before_segment,
            after_segment,
            parameters: regime_parameters(run),
        },
        posterior,
        diagnostics,
        warning,
        nearby_events: Vec::new(),
    })
}

/// Empirical PMF over `tau` in `0..n_returns`; index 0 always has zero mass.
pub fn tau_pmf(taus: &[usize], n_returns: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_returns];
    for &t in taus {
        counts[t] += 1;
    }
    let total = taus.len() as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

/// Index of the largest mass; ties go to the earliest index.
pub fn mode(pmf: &[f64]) -> usize {
    let mut best = 0;
    for (i, &m) in pmf.iter().enumerate() {
        if m > pmf[best] {
            best = i;
        }
    }
    best
}

/// Smallest contiguous index window holding at least `level` mass.
///
/// Ties in width prefer the window with more mass, then the earliest one.
/// Returns `(low, high, mass)`.
pub fn credible_interval(pmf: &[f64], level: f64) -> (usize, usize, f64) {
    let target = level - 1e-9;
    let mut best: Option<(usize, usize, f64)> = None;
    let mut sum = 0.0;
    let mut left = 0;

    for right in 0..pmf.len() {
        sum += pmf[right];
        while left < right && sum - pmf[left] >= target {
            sum -= pmf[left];
            left += 1;
        }
        if sum >= target {
            let better = match best {
                None => true,
                Some((l, r, m)) => {
                    let (width, best_width) = (right - left, r - l);
                    width < best_width || (width == best_width && sum > m + 1e-12)
                }
            };
            if better {
                best = Some((left, right, sum));
            }
        }
    }

    best.unwrap_or_else(|| {
        let m = mode(pmf);
        (m, m, pmf.get(m).copied().unwrap_or(0.0))
    })
}

fn regime_parameters(run: &SamplerRun) -> RegimeParameters {
    let mu_before = run.pooled(Param::MuBefore);
    let mu_after = run.pooled(Param::MuAfter);
    let sigma_before = run.pooled(Param::SigmaBefore);
    let sigma_after = run.pooled(Param::SigmaAfter);
    let increases = mu_before.iter().zip(&mu_after).filter(|(b, a)| a > b).count();

    RegimeParameters {
        mu_before: indicators::mean(&mu_before).unwrap_or(0.0),
        mu_after: indicators::mean(&mu_after).unwrap_or(0.0),
        sigma_before: indicators::mean(&sigma_before).unwrap_or(0.0),
        sigma_after: indicators::mean(&sigma_after).unwrap_or(0.0),
        mean_increase_probability: increases as f64 / mu_before.len().max(1) as f64,
    }
}

fn attach_events(store: &SeriesStore, result: &mut ChangePointResult) {
    let interval = result.estimate.credible_interval;
    let filter = EventFilter {
        start_date: Some(interval.low_date),
        end_date: Some(interval.high_date),
        ..Default::default()
    };
    result.nearby_events = query_service::filter_events(store, &filter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_breaks_ties_to_earliest() {
        assert_eq!(mode(&[0.0, 0.4, 0.2, 0.4]), 1);
        assert_eq!(mode(&[0.0, 0.0, 1.0]), 2);
    }

    #[test]
    fn test_tau_pmf_sums_to_one() {
        let pmf = tau_pmf(&[1, 2, 2, 3, 3, 3], 5);
        assert_eq!(pmf.len(), 5);
        assert_eq!(pmf[0], 0.0);
        assert!((pmf.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((pmf[3] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_credible_interval_is_smallest_window() {
        let pmf = [0.0, 0.05, 0.1, 0.6, 0.2, 0.05];
        let (low, high, mass) = credible_interval(&pmf, 0.9);
        assert_eq!((low, high), (2, 4));
        assert!((mass - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_credible_interval_point_mass() {
        let pmf = [0.0, 0.0, 1.0, 0.0];
        assert_eq!(credible_interval(&pmf, 0.9), (2, 2, 1.0));
    }

    #[test]
    fn test_credible_interval_spans_gaps() {
        // Bimodal: the window must stay contiguous across the zero-mass gap.
        let pmf = [0.0, 0.5, 0.0, 0.0, 0.5];
        let (low, high, mass) = credible_interval(&pmf, 0.9);
        assert_eq!((low, high), (1, 4));
        assert!((mass - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bic_gain_prefers_real_split() {
        let mut returns: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        returns.extend((0..60).map(|i| if i % 2 == 0 { 0.06 } else { 0.04 }));
        assert!(bic_gain(&returns, 60) > 0.0);

        let flat: Vec<f64> = (0..120).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        assert!(bic_gain(&flat, 60) < 0.0);
    }

    #[test]
    fn test_detector_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());
        let config = DetectorConfig {
            credible_mass: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
