//! Gibbs sampler for the single change-point Normal model on log returns.
//!
//! Model: `r_i ~ N(mu_1, sigma_1^2)` for the first `tau` returns and
//! `N(mu_2, sigma_2^2)` afterwards, `tau` uniform on `{1..n-1}`,
//! `mu_k ~ N(mean(r), (10 sd(r))^2)`, `sigma_k^2 ~ InvGamma(2, var(r))`.
//!
//! Each iteration draws `tau` from its exact discrete conditional (O(n) via
//! prefix sums) and then the conjugate conditionals of `mu_k` and `sigma_k^2`.
//! Chains run in parallel with independent seeded RNGs; draws are only
//! pooled after burn-in is discarded and split-R-hat has been evaluated.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, StandardNormal};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::errors::AnalysisError;
use crate::services::indicators;

const VARIANCE_FLOOR: f64 = 1e-12;
const PRIOR_MU_SD_SCALE: f64 = 10.0;
const PRIOR_VARIANCE_SHAPE: f64 = 2.0;
/// Iterations every chain completes before the deadline is honoured.
const MIN_ITERATIONS: usize = 20;
const DEADLINE_CHECK_EVERY: usize = 64;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub chains: usize,
    pub iterations: usize,
    pub burn_in_fraction: f64,
    pub rhat_threshold: f64,
    pub max_attempts: usize,
    pub max_duration: Option<Duration>,
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            iterations: 2000,
            burn_in_fraction: 0.5,
            rhat_threshold: 1.1,
            max_attempts: 3,
            max_duration: Some(Duration::from_secs(30)),
            seed: 20220224,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.chains == 0 {
            return Err("sampler needs at least one chain".to_string());
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(format!("sampler needs at least {} iterations per chain", MIN_ITERATIONS));
        }
        if !(0.0..1.0).contains(&self.burn_in_fraction) {
            return Err("burn-in fraction must be in [0, 1)".to_string());
        }
        if !(self.rhat_threshold > 1.0) {
            return Err("R-hat threshold must be greater than 1".to_string());
        }
        if self.max_attempts == 0 {
            return Err("sampler needs at least one attempt".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Priors {
    mu_mean: f64,
    mu_var: f64,
    shape: f64,
    scale: f64,
}

impl Priors {
    fn from_returns(returns: &[f64]) -> Self {
        let mean = indicators::mean(returns).unwrap_or(0.0);
        let var = indicators::sample_variance(returns)
            .unwrap_or(VARIANCE_FLOOR)
            .max(VARIANCE_FLOOR);
        Self {
            mu_mean: mean,
            mu_var: PRIOR_MU_SD_SCALE * PRIOR_MU_SD_SCALE * var,
            shape: PRIOR_VARIANCE_SHAPE,
            // Prior mean of sigma^2 equals the pooled sample variance.
            scale: var * (PRIOR_VARIANCE_SHAPE - 1.0),
        }
    }
}

/// Sufficient statistics of the returns.
struct Data<'a> {
    sums: &'a [f64],
    squares: &'a [f64],
    n: usize,
}

impl Data<'_> {
    /// `(count, sum, sum of squares)` over `returns[a..b]`.
    fn stats(&self, a: usize, b: usize) -> (f64, f64, f64) {
        ((b - a) as f64, self.sums[b] - self.sums[a], self.squares[b] - self.squares[a])
    }

    /// Gaussian log-likelihood of `returns[a..b]` without the 2*pi term,
    /// which is constant across `tau`.
    fn log_lik(&self, a: usize, b: usize, mu: f64, var: f64) -> f64 {
        let (m, s, q) = self.stats(a, b);
        let ss = (q - 2.0 * mu * s + m * mu * mu).max(0.0);
        -0.5 * m * var.ln() - ss / (2.0 * var)
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    tau: usize,
    mu: [f64; 2],
    var: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    MuBefore,
    MuAfter,
    SigmaBefore,
    SigmaAfter,
}

/// Retained (post burn-in) draws of one chain.
#[derive(Debug, Clone, Default)]
pub struct ChainDraws {
    pub tau: Vec<usize>,
    pub mu_before: Vec<f64>,
    pub mu_after: Vec<f64>,
    pub sigma_before: Vec<f64>,
    pub sigma_after: Vec<f64>,
    pub iterations_run: usize,
    pub burn_in: usize,
    pub hit_deadline: bool,
}

impl ChainDraws {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            tau: Vec::with_capacity(capacity),
            mu_before: Vec::with_capacity(capacity),
            mu_after: Vec::with_capacity(capacity),
            sigma_before: Vec::with_capacity(capacity),
            sigma_after: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    fn push(&mut self, state: &State) {
        self.tau.push(state.tau);
        self.mu_before.push(state.mu[0]);
        self.mu_after.push(state.mu[1]);
        self.sigma_before.push(state.var[0].sqrt());
        self.sigma_after.push(state.var[1].sqrt());
    }

    fn drop_burn_in(&mut self, burn_in: usize) {
        self.tau.drain(..burn_in);
        self.mu_before.drain(..burn_in);
        self.mu_after.drain(..burn_in);
        self.sigma_before.drain(..burn_in);
        self.sigma_after.drain(..burn_in);
        self.burn_in = burn_in;
    }

    pub fn values(&self, param: Param) -> &[f64] {
        match param {
            Param::MuBefore => &self.mu_before,
            Param::MuAfter => &self.mu_after,
            Param::SigmaBefore => &self.sigma_before,
            Param::SigmaAfter => &self.sigma_after,
        }
    }

    pub fn len(&self) -> usize {
        self.tau.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tau.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    pub r_hat_tau: f64,
    pub r_hat_mu_before: f64,
    pub r_hat_mu_after: f64,
    pub max_r_hat: f64,
    pub converged: bool,
}

/// Outcome of the best sampling attempt.
#[derive(Debug, Clone)]
pub struct SamplerRun {
    pub chains: Vec<ChainDraws>,
    pub iterations_per_chain: usize,
    pub attempts: usize,
    pub convergence: Convergence,
    pub budget_exhausted: bool,
}

impl SamplerRun {
    pub fn retained_draws(&self) -> usize {
        self.chains.iter().map(ChainDraws::len).sum()
    }

    pub fn burn_in(&self) -> usize {
        self.chains.iter().map(|c| c.burn_in).max().unwrap_or(0)
    }

    /// Concatenation of all chains' retained `tau` draws.
    pub fn pooled_tau(&self) -> Vec<usize> {
        self.chains.iter().flat_map(|c| c.tau.iter().copied()).collect()
    }

    pub fn pooled(&self, param: Param) -> Vec<f64> {
        self.chains.iter().flat_map(|c| c.values(param).iter().copied()).collect()
    }
}

/// Deterministic per-chain seed; distinct for every (seed, chain, attempt).
fn chain_seed(seed: u64, chain: usize, attempt: usize) -> u64 {
    let mixed = seed ^ (chain as u64).rotate_left(32) ^ (attempt as u64).rotate_left(48);
    mixed.wrapping_mul(0x9e3779b97f4a7c15)
}

/// Sample the change-point posterior for `returns`, retrying with doubled
/// chain length until split-R-hat passes, attempts run out, or the time
/// budget is spent.
pub fn run_sampler(returns: &[f64], config: &SamplerConfig) -> Result<SamplerRun, AnalysisError> {
    config.validate().map_err(AnalysisError::InvalidSeries)?;
    if returns.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            what: "change point detection",
            required: 2,
            actual: returns.len(),
        });
    }

    let (sums, squares) = indicators::prefix_sums(returns);
    let data = Data {
        sums: &sums,
        squares: &squares,
        n: returns.len(),
    };
    let priors = Priors::from_returns(returns);
    let started = Instant::now();
    let deadline = config.max_duration.map(|d| started + d);

    let mut best: Option<SamplerRun> = None;

    for attempt in 0..config.max_attempts {
        let iterations = config.iterations.saturating_mul(1 << attempt.min(16));
        debug!(
            "Change-point sampler attempt {} with {} chains x {} iterations over {} returns",
            attempt + 1,
            config.chains,
            iterations,
            data.n
        );

        let chains: Vec<ChainDraws> = (0..config.chains)
            .into_par_iter()
            .map(|chain| {
                let mut rng = StdRng::seed_from_u64(chain_seed(config.seed, chain, attempt));
                run_chain(&data, &priors, chain, config, iterations, deadline, &mut rng)
            })
            .collect::<Result<_, _>>()?;

        let convergence = diagnose(&chains, config.rhat_threshold);
        let budget_exhausted = chains.iter().any(|c| c.hit_deadline)
            || deadline.is_some_and(|d| Instant::now() >= d);

        let run = SamplerRun {
            chains,
            iterations_per_chain: iterations,
            attempts: attempt + 1,
            convergence,
            budget_exhausted,
        };

        let improves = best
            .as_ref()
            .map_or(true, |b| run.convergence.max_r_hat <= b.convergence.max_r_hat);
        let done = convergence.converged || budget_exhausted;

        if improves {
            best = Some(run);
        } else if let Some(b) = best.as_mut() {
            b.attempts = attempt + 1;
            b.budget_exhausted = budget_exhausted;
        }

        if done {
            break;
        }
        warn!(
            "Change-point sampler did not converge on attempt {} (max R-hat {:.3})",
            attempt + 1,
            convergence.max_r_hat
        );
    }

    let run = best.ok_or_else(|| AnalysisError::InvalidSeries("sampler produced no draws".to_string()))?;
    info!(
        "Change-point sampler finished: {} attempts, {} retained draws, max R-hat {:.3}, converged={} in {:?}",
        run.attempts,
        run.retained_draws(),
        run.convergence.max_r_hat,
        run.convergence.converged,
        started.elapsed()
    );
    Ok(run)
}

fn run_chain(
    data: &Data<'_>,
    priors: &Priors,
    chain: usize,
    config: &SamplerConfig,
    iterations: usize,
    deadline: Option<Instant>,
    rng: &mut StdRng,
) -> Result<ChainDraws, AnalysisError> {
    let mut state = initial_state(data, priors, chain, config.chains);
    let mut draws = ChainDraws::with_capacity(iterations);
    let mut log_weights = vec![0.0; data.n];

    for i in 0..iterations {
        if i >= MIN_ITERATIONS && i % DEADLINE_CHECK_EVERY == 0 {
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    draws.hit_deadline = true;
                    break;
                }
            }
        }

        state.tau = sample_tau(data, &state, &mut log_weights, rng);
        for k in 0..2 {
            let (a, b) = if k == 0 { (0, state.tau) } else { (state.tau, data.n) };
            state.mu[k] = sample_mu(data, priors, a, b, state.var[k], rng);
            state.var[k] = sample_variance(data, priors, a, b, state.mu[k], rng)?;
        }
        draws.push(&state);
    }

    draws.iterations_run = draws.len();
    let burn_in = ((draws.iterations_run as f64) * config.burn_in_fraction).floor() as usize;
    draws.drop_burn_in(burn_in.min(draws.iterations_run.saturating_sub(1)));
    Ok(draws)
}

/// Chains start at evenly spaced `tau` values across the series.
fn initial_state(data: &Data<'_>, priors: &Priors, chain: usize, chains: usize) -> State {
    let tau = ((chain + 1) * data.n / (chains + 1)).clamp(1, data.n - 1);
    let prior_var = priors.scale / (priors.shape - 1.0);
    let mut state = State {
        tau,
        mu: [priors.mu_mean; 2],
        var: [prior_var; 2],
    };
    for (k, (a, b)) in [(0, tau), (tau, data.n)].into_iter().enumerate() {
        let (m, s, q) = data.stats(a, b);
        state.mu[k] = s / m;
        if m >= 2.0 {
            state.var[k] = ((q - s * s / m) / (m - 1.0)).max(VARIANCE_FLOOR);
        }
    }
    state
}

fn sample_tau(data: &Data<'_>, state: &State, log_weights: &mut [f64], rng: &mut StdRng) -> usize {
    let mut max = f64::NEG_INFINITY;
    for tau in 1..data.n {
        let lw = data.log_lik(0, tau, state.mu[0], state.var[0])
            + data.log_lik(tau, data.n, state.mu[1], state.var[1]);
        log_weights[tau] = lw;
        if lw > max {
            max = lw;
        }
    }

    let mut total = 0.0;
    for w in log_weights[1..data.n].iter_mut() {
        *w = (*w - max).exp();
        total += *w;
        *w = total;
    }

    let u = rng.random::<f64>() * total;
    let pos = log_weights[1..data.n].partition_point(|&cum| cum <= u);
    (pos + 1).min(data.n - 1)
}

fn sample_mu(data: &Data<'_>, priors: &Priors, a: usize, b: usize, var: f64, rng: &mut StdRng) -> f64 {
    let (m, s, _) = data.stats(a, b);
    let precision = 1.0 / priors.mu_var + m / var;
    let mean = (priors.mu_mean / priors.mu_var + s / var) / precision;
    let z: f64 = rng.sample(StandardNormal);
    mean + z / precision.sqrt()
}

fn sample_variance(
    data: &Data<'_>,
    priors: &Priors,
    a: usize,
    b: usize,
    mu: f64,
    rng: &mut StdRng,
) -> Result<f64, AnalysisError> {
    let (m, s, q) = data.stats(a, b);
    let ss = (q - 2.0 * mu * s + m * mu * mu).max(0.0);
    let shape = priors.shape + m / 2.0;
    let rate = priors.scale + ss / 2.0;
    let gamma = Gamma::new(shape, 1.0 / rate).map_err(|e| {
        AnalysisError::InvalidSeries(format!("invalid variance conditional (shape {}, rate {}): {}", shape, rate, e))
    })?;
    let precision: f64 = gamma.sample(rng);
    Ok((1.0 / precision).max(VARIANCE_FLOOR))
}

/// Split-R-hat over `tau`, `mu_before`, `mu_after`.
pub fn diagnose(chains: &[ChainDraws], threshold: f64) -> Convergence {
    let tau: Vec<Vec<f64>> = chains
        .iter()
        .map(|c| c.tau.iter().map(|&t| t as f64).collect())
        .collect();
    let mu_before: Vec<Vec<f64>> = chains.iter().map(|c| c.mu_before.clone()).collect();
    let mu_after: Vec<Vec<f64>> = chains.iter().map(|c| c.mu_after.clone()).collect();

    let r_hat_tau = split_r_hat(&tau);
    let r_hat_mu_before = split_r_hat(&mu_before);
    let r_hat_mu_after = split_r_hat(&mu_after);
    let max_r_hat = r_hat_tau.max(r_hat_mu_before).max(r_hat_mu_after);

    Convergence {
        r_hat_tau,
        r_hat_mu_before,
        r_hat_mu_after,
        max_r_hat,
        converged: max_r_hat.is_finite() && max_r_hat <= threshold,
    }
}

/// Gelman-Rubin potential scale reduction on half-chains.
///
/// Chains are truncated to a common length first. Identical constant chains
/// give 1.0; constant but disagreeing chains give infinity.
pub fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let common = chains.iter().map(Vec::len).min().unwrap_or(0);
    let half = common / 2;
    if chains.is_empty() || half < 2 {
        return f64::INFINITY;
    }

    let halves: Vec<&[f64]> = chains
        .iter()
        .flat_map(|c| [&c[..half], &c[common - half..common]])
        .collect();

    let len = half as f64;
    let means: Vec<f64> = halves.iter().map(|h| h.iter().sum::<f64>() / len).collect();
    let grand = means.iter().sum::<f64>() / means.len() as f64;

    let between = len / (means.len() as f64 - 1.0)
        * means.iter().map(|m| (m - grand).powi(2)).sum::<f64>();
    let within = halves
        .iter()
        .zip(&means)
        .map(|(h, m)| h.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (len - 1.0))
        .sum::<f64>()
        / halves.len() as f64;

    let scale = grand.abs().max(1.0);
    if within <= f64::EPSILON * scale * scale {
        return if between <= f64::EPSILON * scale * scale { 1.0 } else { f64::INFINITY };
    }

    let pooled = (len - 1.0) / len * within + between / len;
    (pooled / within).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::Normal;

    fn shifted_returns(seed: u64, n: usize, tau: usize, mu: (f64, f64), sigma: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let before = Normal::new(mu.0, sigma).unwrap();
        let after = Normal::new(mu.1, sigma).unwrap();
        (0..n)
            .map(|i| if i < tau { before.sample(&mut rng) } else { after.sample(&mut rng) })
            .collect()
    }

    #[test]
    fn test_split_r_hat_identical_chains() {
        let chains = vec![vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0]; 4];
        let r = split_r_hat(&chains);
        assert!(r < 1.1, "r_hat = {}", r);
    }

    #[test]
    fn test_split_r_hat_disagreeing_chains() {
        let chains = vec![
            vec![0.0, 0.1, 0.0, 0.1, 0.0, 0.1, 0.0, 0.1],
            vec![10.0, 10.1, 10.0, 10.1, 10.0, 10.1, 10.0, 10.1],
        ];
        assert!(split_r_hat(&chains) > 1.1);
    }

    #[test]
    fn test_split_r_hat_constant_chains() {
        assert_eq!(split_r_hat(&[vec![5.0; 10], vec![5.0; 10]]), 1.0);
        assert_eq!(split_r_hat(&[vec![5.0; 10], vec![6.0; 10]]), f64::INFINITY);
        assert_eq!(split_r_hat(&[vec![5.0; 3]]), f64::INFINITY);
    }

    #[test]
    fn test_sampler_is_reproducible() {
        let returns = shifted_returns(7, 120, 60, (0.0, 0.02), 0.01);
        let config = SamplerConfig {
            iterations: 300,
            max_duration: None,
            ..Default::default()
        };
        let a = run_sampler(&returns, &config).unwrap();
        let b = run_sampler(&returns, &config).unwrap();
        assert_eq!(a.pooled_tau(), b.pooled_tau());
    }

    #[test]
    fn test_burn_in_is_discarded() {
        let returns = shifted_returns(11, 80, 40, (0.0, 0.03), 0.01);
        let config = SamplerConfig {
            chains: 2,
            iterations: 200,
            burn_in_fraction: 0.25,
            max_attempts: 1,
            max_duration: None,
            ..Default::default()
        };
        let run = run_sampler(&returns, &config).unwrap();
        for chain in &run.chains {
            assert_eq!(chain.iterations_run, 200);
            assert_eq!(chain.burn_in, 50);
            assert_eq!(chain.len(), 150);
        }
        assert_eq!(run.retained_draws(), 300);
        assert!(run.pooled_tau().iter().all(|&t| (1..80).contains(&t)));
    }

    #[test]
    fn test_sampler_finds_clear_shift() {
        let returns = shifted_returns(3, 200, 100, (0.0, 0.02), 0.01);
        let run = run_sampler(&returns, &SamplerConfig::default()).unwrap();
        let taus = run.pooled_tau();
        let near = taus.iter().filter(|&&t| t.abs_diff(100) <= 5).count();
        assert!(near as f64 / taus.len() as f64 > 0.8);
        assert!(run.convergence.converged, "{:?}", run.convergence);
    }

    #[test]
    fn test_zero_budget_still_returns_draws() {
        let returns = shifted_returns(5, 100, 50, (0.0, 0.02), 0.01);
        let config = SamplerConfig {
            iterations: 100_000,
            max_duration: Some(Duration::from_millis(0)),
            ..Default::default()
        };
        let run = run_sampler(&returns, &config).unwrap();
        assert!(run.budget_exhausted);
        assert_eq!(run.attempts, 1);
        assert!(run.retained_draws() > 0);
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config = SamplerConfig::default();
        config.chains = 0;
        assert!(config.validate().is_err());

        let mut config = SamplerConfig::default();
        config.burn_in_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = SamplerConfig::default();
        config.rhat_threshold = 1.0;
        assert!(config.validate().is_err());
    }
}
