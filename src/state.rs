use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::change_point_service::DetectorConfig;
use crate::services::summary_cache::SummaryCache;
use crate::store::SeriesStore;

/// Shared, read-only view of the loaded data. The store never changes after
/// startup, so handlers read it without locking.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SeriesStore>,
    pub summary_cache: SummaryCache,
    pub detector: Arc<DetectorConfig>,
    pub impact_min_points: usize,
    pub default_window_days: u32,
}

impl AppState {
    pub fn new(store: SeriesStore, config: &AppConfig) -> Self {
        Self {
            store: Arc::new(store),
            summary_cache: SummaryCache::new(),
            detector: Arc::new(config.detector.clone()),
            impact_min_points: config.impact_min_points,
            default_window_days: config.default_window_days,
        }
    }
}
