use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Where log lines go and how they are labelled.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub loki_enabled: bool,
    pub loki_url: Option<String>,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            loki_enabled: std::env::var("LOKI_ENABLED")
                .ok()
                .and_then(|s| s.parse::<bool>().ok())
                .unwrap_or(false),
            loki_url: std::env::var("LOKI_URL").ok(),
            service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "brent-impact".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Environment settings with Loki forced off, for one-shot tools that
    /// exit before a shipping task could flush.
    pub fn console_only() -> Self {
        Self {
            loki_enabled: false,
            ..Self::from_env()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.loki_enabled && self.loki_url.is_none() {
            return Err("LOKI_ENABLED is true but LOKI_URL is not set".to_string());
        }
        Ok(())
    }

    /// Directive filter for `log_level`, or `info` when the directives do
    /// not parse. The second value is the rejected input, if any.
    fn env_filter(&self) -> (EnvFilter, Option<String>) {
        match EnvFilter::try_new(&self.log_level) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_LOG_LEVEL), Some(self.log_level.clone())),
        }
    }
}

pub fn init_logging(config: LoggingConfig) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;
    let (filter, rejected) = config.env_filter();

    #[cfg(feature = "loki")]
    {
        if let (true, Some(loki_url)) = (config.loki_enabled, config.loki_url.as_deref()) {
            init_with_loki(&config, filter, loki_url)?;
            announce(&config, rejected, true);
            return Ok(());
        }
    }
    #[cfg(not(feature = "loki"))]
    {
        if config.loki_enabled {
            eprintln!("LOKI_ENABLED is set but the binary was built without the `loki` feature");
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to install console logging")?;
    announce(&config, rejected, false);
    Ok(())
}

fn announce(config: &LoggingConfig, rejected: Option<String>, with_loki: bool) {
    if let Some(rejected) = rejected {
        tracing::warn!("Ignoring invalid RUST_LOG {:?}; logging at {}", rejected, DEFAULT_LOG_LEVEL);
    }
    tracing::info!(
        "Logging initialized for {} ({}, loki={})",
        config.service_name,
        config.environment,
        with_loki
    );
}

#[cfg(feature = "loki")]
fn init_with_loki(config: &LoggingConfig, filter: EnvFilter, loki_url: &str) -> Result<()> {
    let url = url::Url::parse(loki_url).with_context(|| format!("Invalid LOKI_URL {:?}", loki_url))?;

    let (loki_layer, task) = tracing_loki::builder()
        .label("service", &config.service_name)?
        .label("environment", &config.environment)?
        .build_url(url)?;

    // Ships buffered log lines to Loki; needs a running tokio runtime.
    tokio::spawn(task);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(loki_layer)
        .try_init()
        .context("Failed to install Loki logging")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(loki_enabled: bool, loki_url: Option<&str>) -> LoggingConfig {
        LoggingConfig {
            loki_enabled,
            loki_url: loki_url.map(str::to_string),
            service_name: "brent-impact".to_string(),
            environment: "test".to_string(),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_loki_requires_url() {
        assert!(config(true, None).validate().is_err());
        assert!(config(true, Some("http://localhost:3100")).validate().is_ok());
        assert!(config(false, None).validate().is_ok());
    }

    #[test]
    fn test_console_only_disables_loki() {
        assert!(!LoggingConfig::console_only().loki_enabled);
    }

    #[test]
    fn test_invalid_filter_falls_back_to_info() {
        let mut bad = config(false, None);
        bad.log_level = "brent_impact=notalevel".to_string();
        let (_, rejected) = bad.env_filter();
        assert_eq!(rejected.as_deref(), Some("brent_impact=notalevel"));

        let (_, rejected) = config(false, None).env_filter();
        assert!(rejected.is_none());
    }
}
