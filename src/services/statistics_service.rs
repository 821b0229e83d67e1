use chrono::NaiveDate;
use tracing::debug;

use crate::errors::AnalysisError;
use crate::models::{PricePoint, PriceSummary, Segment};
use crate::services::indicators;
use crate::services::summary_cache::SummaryCache;
use crate::store::SeriesStore;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summarize a slice of the price series.
///
/// Fails with `InsufficientData` on a single point because the volatility of
/// log returns needs at least one return pair.
pub fn summarize(series: &[PricePoint]) -> Result<PriceSummary, AnalysisError> {
    let prices: Vec<f64> = series.iter().map(|p| p.price).collect();
    summarize_prices(&prices)
}

pub fn summarize_prices(prices: &[f64]) -> Result<PriceSummary, AnalysisError> {
    if prices.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            what: "volatility",
            required: 2,
            actual: prices.len(),
        });
    }

    let volatility = annualized_volatility(prices)?;
    let (min, max) = prices
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));

    Ok(PriceSummary {
        mean: indicators::mean(prices).unwrap_or(0.0),
        median: indicators::median(prices).unwrap_or(0.0),
        std_dev: indicators::sample_std_dev(prices).unwrap_or(0.0),
        volatility,
        min,
        max,
        count: prices.len(),
    })
}

/// Sample std-dev of daily log returns scaled by sqrt(252).
pub fn annualized_volatility(prices: &[f64]) -> Result<f64, AnalysisError> {
    let returns = indicators::log_returns(prices);
    match returns.len() {
        0 => Err(AnalysisError::InsufficientData {
            what: "volatility",
            required: 2,
            actual: prices.len(),
        }),
        // One return has no spread to measure.
        1 => Ok(0.0),
        _ => Ok(indicators::sample_std_dev(&returns).unwrap_or(0.0) * TRADING_DAYS_PER_YEAR.sqrt()),
    }
}

/// Filter the store to the inclusive range and summarize it, memoizing on the
/// index bounds the range selects.
pub fn summarize_range(
    store: &SeriesStore,
    cache: &SummaryCache,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<PriceSummary, AnalysisError> {
    let (lo, hi) = store.index_range(start, end);
    if lo >= hi {
        return Err(AnalysisError::EmptyRange {
            start: start.unwrap_or_else(|| store.first_date()),
            end: end.unwrap_or_else(|| store.last_date()),
        });
    }

    if let Some(hit) = cache.get(lo, hi) {
        debug!("Statistics cache hit for indices {}..{}", lo, hi);
        return Ok(hit);
    }

    let summary = summarize(&store.prices()[lo..hi])?;
    cache.insert(lo, hi, summary);
    Ok(summary)
}

/// Price-level segment description for `[start_index, end_index]` of `series`.
pub fn describe_segment(
    series: &[PricePoint],
    start_index: usize,
    end_index: usize,
) -> Result<Segment, AnalysisError> {
    if start_index > end_index || end_index >= series.len() {
        return Err(AnalysisError::InvalidSeries(format!(
            "segment [{}, {}] is outside a series of {} points",
            start_index,
            end_index,
            series.len()
        )));
    }

    let slice = &series[start_index..=end_index];
    let prices: Vec<f64> = slice.iter().map(|p| p.price).collect();

    Ok(Segment {
        start_index,
        end_index,
        start_date: slice[0].date,
        end_date: slice[slice.len() - 1].date,
        count: slice.len(),
        mean: indicators::mean(&prices).unwrap_or(0.0),
        variance: indicators::sample_variance(&prices).unwrap_or(0.0),
    })
}
