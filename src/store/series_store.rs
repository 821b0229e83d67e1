use chrono::NaiveDate;

use crate::errors::AnalysisError;
use crate::models::{Event, PricePoint};

/// Immutable, date-sorted price series plus the event list.
///
/// Built once at startup and shared read-only behind an `Arc`; every view it
/// hands out is a borrowed slice.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    prices: Vec<PricePoint>,
    events: Vec<Event>,
}

impl SeriesStore {
    pub fn new(mut prices: Vec<PricePoint>, mut events: Vec<Event>) -> Result<Self, AnalysisError> {
        if prices.is_empty() {
            return Err(AnalysisError::InvalidSeries("price series is empty".to_string()));
        }
        if let Some(bad) = prices.iter().find(|p| !p.price.is_finite() || p.price <= 0.0) {
            return Err(AnalysisError::InvalidSeries(format!(
                "non-positive price {} on {}",
                bad.price, bad.date
            )));
        }

        prices.sort_by_key(|p| p.date);
        if let Some(pair) = prices.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(AnalysisError::InvalidSeries(format!(
                "duplicate price date {}",
                pair[0].date
            )));
        }

        // Stable: same-date events keep their file order.
        events.sort_by_key(|e| e.date);

        Ok(Self { prices, events })
    }

    pub fn prices(&self) -> &[PricePoint] {
        &self.prices
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.prices[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.prices[self.prices.len() - 1].date
    }

    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        (self.first_date(), self.last_date())
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.first_date() && date <= self.last_date()
    }

    /// Index of the first point dated on or after `date`.
    pub fn lower_bound(&self, date: NaiveDate) -> usize {
        self.prices.partition_point(|p| p.date < date)
    }

    /// Index one past the last point dated on or before `date`.
    pub fn upper_bound(&self, date: NaiveDate) -> usize {
        self.prices.partition_point(|p| p.date <= date)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.prices.binary_search_by_key(&date, |p| p.date).ok()
    }

    /// Inclusive `[start, end]` view; missing bounds default to the series bounds.
    pub fn range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> &[PricePoint] {
        let lo = start.map_or(0, |d| self.lower_bound(d));
        let hi = end.map_or(self.prices.len(), |d| self.upper_bound(d));
        if lo >= hi {
            return &[];
        }
        &self.prices[lo..hi]
    }

    /// Index bounds `[lo, hi)` of the inclusive date range.
    pub fn index_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> (usize, usize) {
        let lo = start.map_or(0, |d| self.lower_bound(d));
        let hi = end.map_or(self.prices.len(), |d| self.upper_bound(d));
        (lo, hi.max(lo))
    }
}
