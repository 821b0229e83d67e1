use anyhow::Context;
use tokio::net::TcpListener;

use brent_impact::app;
use brent_impact::config::AppConfig;
use brent_impact::logging::{self, LoggingConfig};
use brent_impact::services::csv_import_service;
use brent_impact::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    logging::init_logging(LoggingConfig::from_env()).context("Failed to initialize logging")?;

    let config = AppConfig::from_env();
    config.validate().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let store = csv_import_service::load_store(&config.prices_path(), &config.events_path())
        .context("Failed to load price data")?;
    let state = AppState::new(store, &config);
    tracing::info!(
        "📊 Change-point detector: {} chains x {} iterations, seed {}",
        config.detector.sampler.chains,
        config.detector.sampler.iterations,
        config.detector.sampler.seed
    );
    let price_count = state.store.len();
    let app = app::create_app(state);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "🚀 Brent impact backend running at http://{}/ ({} prices)",
        addr,
        price_count
    );
    axum::serve(listener, app).await?;

    Ok(())
}
