use chrono::NaiveDate;

use crate::models::{CategoriesResponse, Event, EventFilter, PricePoint};
use crate::store::SeriesStore;

/// Events matching every provided filter, in ascending date order.
pub fn filter_events(store: &SeriesStore, filter: &EventFilter) -> Vec<Event> {
    store
        .events()
        .iter()
        .filter(|e| filter.matches(e))
        .cloned()
        .collect()
}

/// Prices in the inclusive date range, in ascending date order.
pub fn filter_prices(store: &SeriesStore, start: Option<NaiveDate>, end: Option<NaiveDate>) -> &[PricePoint] {
    store.range(start, end)
}

/// Distinct categories and impact levels in order of first appearance.
pub fn categories(store: &SeriesStore) -> CategoriesResponse {
    let mut categories: Vec<String> = Vec::new();
    let mut impact_levels: Vec<String> = Vec::new();
    for event in store.events() {
        if !categories.contains(&event.category) {
            categories.push(event.category.clone());
        }
        if !impact_levels.contains(&event.impact_level) {
            impact_levels.push(event.impact_level.clone());
        }
    }
    CategoriesResponse {
        categories,
        impact_levels,
    }
}
