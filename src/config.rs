use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::services::change_point_service::DetectorConfig;
use crate::services::impact_service;
use crate::services::mcmc::SamplerConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub prices_file: String,
    pub events_file: String,
    pub bind_addr: String,
    pub port: u16,
    pub impact_min_points: usize,
    pub default_window_days: u32,
    pub detector: DetectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            prices_file: "brent_prices.csv".to_string(),
            events_file: "events.csv".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            impact_min_points: impact_service::DEFAULT_MIN_POINTS,
            default_window_days: impact_service::DEFAULT_WINDOW_DAYS,
            detector: DetectorConfig::default(),
        }
    }
}

/// Parsed value of `key`, or `default` when unset. Unparseable values are
/// logged and ignored.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={:?}; using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let sampler_defaults = SamplerConfig::default();
        let detector_defaults = DetectorConfig::default();

        let max_seconds = env_or(
            "CHANGEPOINT_MAX_SECONDS",
            sampler_defaults.max_duration.map(|d| d.as_secs()).unwrap_or(0),
        );

        let sampler = SamplerConfig {
            chains: env_or("CHANGEPOINT_CHAINS", sampler_defaults.chains),
            iterations: env_or("CHANGEPOINT_SAMPLES", sampler_defaults.iterations),
            burn_in_fraction: env_or("CHANGEPOINT_BURN_IN", sampler_defaults.burn_in_fraction),
            rhat_threshold: env_or("CHANGEPOINT_RHAT_THRESHOLD", sampler_defaults.rhat_threshold),
            max_attempts: env_or("CHANGEPOINT_MAX_ATTEMPTS", sampler_defaults.max_attempts),
            // 0 disables the wall-clock budget.
            max_duration: (max_seconds > 0).then(|| Duration::from_secs(max_seconds)),
            seed: env_or("CHANGEPOINT_SEED", sampler_defaults.seed),
        };

        Self {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            prices_file: std::env::var("PRICES_FILE").unwrap_or(defaults.prices_file),
            events_file: std::env::var("EVENTS_FILE").unwrap_or(defaults.events_file),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: env_or("PORT", defaults.port),
            impact_min_points: env_or("IMPACT_MIN_POINTS", defaults.impact_min_points),
            default_window_days: env_or("IMPACT_DEFAULT_WINDOW_DAYS", defaults.default_window_days),
            detector: DetectorConfig {
                sampler,
                credible_mass: env_or("CHANGEPOINT_CREDIBLE_MASS", detector_defaults.credible_mass),
                min_returns: env_or("CHANGEPOINT_MIN_RETURNS", detector_defaults.min_returns),
                min_segment_returns: detector_defaults.min_segment_returns,
            },
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.detector.validate()?;
        if self.impact_min_points == 0 {
            return Err("IMPACT_MIN_POINTS must be at least 1".to_string());
        }
        if self.default_window_days == 0 || self.default_window_days > impact_service::MAX_WINDOW_DAYS {
            return Err(format!(
                "IMPACT_DEFAULT_WINDOW_DAYS must be between 1 and {}",
                impact_service::MAX_WINDOW_DAYS
            ));
        }
        Ok(())
    }

    pub fn prices_path(&self) -> PathBuf {
        self.data_dir.join(&self.prices_file)
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join(&self.events_file)
    }
}
