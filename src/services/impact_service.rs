use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::errors::AnalysisError;
use crate::models::{EventFilter, EventImpactSummary, ImpactOutcome, ImpactResult, PricePoint};
use crate::services::indicators;
use crate::services::query_service;
use crate::store::SeriesStore;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 3650;
pub const DEFAULT_MIN_POINTS: usize = 2;

/// Compare mean prices in `[event - w, event)` and `[event, event + w]`
/// (calendar days, clipped to the series).
///
/// An event date outside the series is a caller error; too few points on
/// either side is the `InsufficientData` outcome, never a partial number.
pub fn impact(
    store: &SeriesStore,
    event_date: NaiveDate,
    window_days: u32,
    min_points: usize,
) -> Result<ImpactOutcome, AnalysisError> {
    if window_days == 0 || window_days > MAX_WINDOW_DAYS {
        return Err(AnalysisError::InvalidParameter(format!(
            "window_days must be between 1 and {}",
            MAX_WINDOW_DAYS
        )));
    }
    if !store.contains_date(event_date) {
        let (start, end) = store.date_range();
        return Err(AnalysisError::DateOutOfRange {
            date: event_date,
            start,
            end,
        });
    }

    let (before, after) = windows(store, event_date, window_days);
    let required = min_points.max(1);
    if before.len() < required || after.len() < required {
        debug!(
            "Insufficient data around {}: {} before, {} after (need {})",
            event_date,
            before.len(),
            after.len(),
            required
        );
        return Ok(ImpactOutcome::InsufficientData {
            before_points: before.len(),
            after_points: after.len(),
            required,
        });
    }

    let price_before = mean_price(before);
    let price_after = mean_price(after);
    let absolute_change = price_after - price_before;

    Ok(ImpactOutcome::Impact(ImpactResult {
        event_date,
        window_days,
        price_before,
        price_after,
        absolute_change,
        percentage_change: absolute_change / price_before * 100.0,
        before_points: before.len(),
        after_points: after.len(),
    }))
}

/// Before and after sub-windows around `event_date`.
pub fn windows(store: &SeriesStore, event_date: NaiveDate, window_days: u32) -> (&[PricePoint], &[PricePoint]) {
    let (from, to) = window_bounds(event_date, window_days);
    let prices = store.prices();
    let start = from.map_or(0, |date| store.lower_bound(date));
    let pivot = store.lower_bound(event_date);
    let end = to.map_or(prices.len(), |date| store.upper_bound(date));
    (&prices[start..pivot], &prices[pivot..end.max(pivot)])
}

/// All prices in `[event - w, event + w]`, for charting.
pub fn surrounding_prices(store: &SeriesStore, event_date: NaiveDate, window_days: u32) -> &[PricePoint] {
    let (from, to) = window_bounds(event_date, window_days);
    store.range(from, to)
}

/// `event ± w` days. A bound past the calendar limits is `None`, which the
/// store reads as unbounded on that side.
fn window_bounds(event_date: NaiveDate, window_days: u32) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let span = Duration::days(i64::from(window_days));
    (
        event_date.checked_sub_signed(span),
        event_date.checked_add_signed(span),
    )
}

/// Impact of every event matching `filter`. Events outside the series are
/// reported as insufficient rather than failing the whole batch.
pub fn impacts_for_events(
    store: &SeriesStore,
    filter: &EventFilter,
    window_days: u32,
    min_points: usize,
) -> Result<Vec<EventImpactSummary>, AnalysisError> {
    query_service::filter_events(store, filter)
        .into_iter()
        .map(|event| {
            let outcome = match impact(store, event.date, window_days, min_points) {
                Ok(outcome) => outcome,
                Err(AnalysisError::DateOutOfRange { .. }) => ImpactOutcome::InsufficientData {
                    before_points: 0,
                    after_points: 0,
                    required: min_points.max(1),
                },
                Err(e) => return Err(e),
            };
            Ok(EventImpactSummary {
                impact: outcome.impact().copied(),
                status: outcome.status().to_string(),
                event,
            })
        })
        .collect()
}

fn mean_price(points: &[PricePoint]) -> f64 {
    let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
    indicators::mean(&prices).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    /// Daily prices: 10.0 through day 9, 20.0 from day 10 on.
    fn step_store() -> SeriesStore {
        let start = d("2020-01-01");
        let prices = (0..20)
            .map(|i| PricePoint::new(start + Duration::days(i), if i < 10 { 10.0 } else { 20.0 }))
            .collect();
        SeriesStore::new(prices, vec![]).unwrap()
    }

    #[test]
    fn test_impact_of_step() {
        let outcome = impact(&step_store(), d("2020-01-11"), 5, 2).unwrap();
        let result = outcome.impact().copied().unwrap();
        assert_eq!(result.before_points, 5);
        assert_eq!(result.after_points, 6);
        assert_eq!(result.price_before, 10.0);
        assert_eq!(result.price_after, 20.0);
        assert_eq!(result.absolute_change, 10.0);
        assert_eq!(result.percentage_change, 100.0);
    }

    #[test]
    fn test_event_date_counts_as_after() {
        let store = step_store();
        let (before, after) = windows(&store, d("2020-01-05"), 2);
        assert_eq!(before.iter().map(|p| p.date).collect::<Vec<_>>(), vec![d("2020-01-03"), d("2020-01-04")]);
        assert_eq!(after.first().map(|p| p.date), Some(d("2020-01-05")));
        assert_eq!(after.len(), 3);
    }

    #[test]
    fn test_first_date_is_insufficient() {
        let outcome = impact(&step_store(), d("2020-01-01"), 30, 2).unwrap();
        assert_eq!(
            outcome,
            ImpactOutcome::InsufficientData {
                before_points: 0,
                after_points: 20,
                required: 2,
            }
        );
        assert!(outcome.impact().is_none());
        assert_eq!(outcome.status(), "insufficient_data");
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let err = impact(&step_store(), d("2019-06-01"), 30, 2).unwrap_err();
        assert!(matches!(err, AnalysisError::DateOutOfRange { .. }));
        let err = impact(&step_store(), d("2021-06-01"), 30, 2).unwrap_err();
        assert!(matches!(err, AnalysisError::DateOutOfRange { .. }));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let err = impact(&step_store(), d("2020-01-10"), 0, 2).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter(_)));
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let err = impact(&step_store(), d("2020-01-10"), MAX_WINDOW_DAYS + 1, 2).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter(_)));
        let err = impact(&step_store(), d("2020-01-10"), u32::MAX, 2).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter(_)));
    }

    #[test]
    fn test_windows_clip_at_calendar_limits() {
        let store = step_store();
        let (before, after) = windows(&store, d("2020-01-10"), u32::MAX);
        assert_eq!(before.len(), 9);
        assert_eq!(after.len(), 11);
        assert_eq!(surrounding_prices(&store, d("2020-01-10"), u32::MAX).len(), 20);

        let (before, after) = windows(&store, NaiveDate::MAX, u32::MAX);
        assert_eq!(before.len(), 20);
        assert!(after.is_empty());
    }

    #[test]
    fn test_impact_is_deterministic() {
        let store = step_store();
        let a = impact(&store, d("2020-01-09"), 4, 2).unwrap();
        let b = impact(&store, d("2020-01-09"), 4, 2).unwrap();
        assert_eq!(a, b);
    }
}
