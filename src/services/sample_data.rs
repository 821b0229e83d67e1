use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use csv::Writer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::models::{Event, PricePoint};

/// Historical shocks: date, multiplicative peak effect, name, category, impact level.
const SHOCKS: [(i32, u32, u32, f64, &str, &str, &str); 10] = [
    (1990, 8, 2, 1.3, "Iraq invades Kuwait", "Conflict", "High"),
    (2001, 9, 11, 1.15, "September 11 attacks", "Geopolitical", "High"),
    (2003, 3, 20, 1.1, "US-led invasion of Iraq", "Conflict", "High"),
    (2005, 8, 29, 1.2, "Hurricane Katrina", "Natural Disaster", "Medium"),
    (2008, 9, 15, 0.7, "Lehman Brothers collapse", "Economic", "High"),
    (2011, 2, 15, 1.15, "Arab Spring unrest in Libya", "Conflict", "Medium"),
    (2014, 11, 27, 0.75, "OPEC declines to cut production", "OPEC", "High"),
    (2019, 9, 14, 1.2, "Attack on Saudi Abqaiq facilities", "Conflict", "Medium"),
    (2020, 3, 11, 0.6, "COVID-19 declared a pandemic", "Pandemic", "High"),
    (2022, 2, 24, 1.25, "Russia invades Ukraine", "Conflict", "High"),
];

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Weekday dates from `start` to `end` inclusive.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

fn year_progress(date: NaiveDate) -> f64 {
    f64::from(date.ordinal0()) / 365.0
}

/// Era-dependent trend level the random walk reverts to.
fn base_price(date: NaiveDate) -> f64 {
    let year = date.year();
    let progress = year_progress(date);
    let season = (2.0 * std::f64::consts::PI * progress).sin();
    let base = match year {
        i32::MIN..=1989 => 18.0 + 2.0 * season,
        1990..=1999 => 20.0 + 5.0 * season,
        2000..=2007 => 25.0 + f64::from(year - 2000) * 10.0 + 10.0 * season,
        2008 => {
            let crash = ymd(2008, 9, 15);
            if date < crash {
                120.0 - 20.0 * progress
            } else {
                100.0 - 60.0 * ((date - crash).num_days() as f64 / 100.0)
            }
        }
        2009..=2013 => 40.0 + f64::from(year - 2009) * 12.0 + 20.0 * season,
        2014..=2015 => 100.0 - f64::from(year - 2014) * 25.0 - 10.0 * progress,
        2016..=2019 => 50.0 + f64::from(year - 2016) * 5.0 + 10.0 * season,
        2020 => {
            let covid = ymd(2020, 3, 11);
            if date < covid {
                65.0
            } else {
                65.0 - ((date - covid).num_days() as f64 * 0.5).min(40.0)
            }
        }
        2021 => 25.0 + progress * 50.0,
        _ => {
            if date < ymd(2022, 2, 24) {
                75.0 + progress * 20.0
            } else {
                95.0 + 15.0 * season
            }
        }
    };
    base.max(10.0)
}

fn era_floor(date: NaiveDate) -> f64 {
    match date.year() {
        i32::MIN..=1999 => 10.0,
        2000..=2009 => 20.0,
        _ => 25.0,
    }
}

/// Synthetic Brent-like daily series over `[start, end]`: era trend, a
/// clustered-volatility random walk pulled 2% per day toward the trend, and
/// shocks decaying over five days around each historical event.
pub fn generate_prices(start: NaiveDate, end: NaiveDate, seed: u64) -> Result<Vec<PricePoint>> {
    let dates = trading_days(start, end);
    if dates.is_empty() {
        anyhow::bail!("No trading days between {} and {}", start, end);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let standard = Normal::new(0.0_f64, 1.0).context("Failed to build normal distribution")?;
    let base: Vec<f64> = dates.iter().map(|d| base_price(*d)).collect();

    let mut prices = base.clone();
    let mut volatility = 0.015;
    let mut last_return = standard.sample(&mut rng) * 0.015;
    for i in 1..dates.len() {
        volatility = 0.95 * volatility + 0.05 * last_return.abs() + 0.008;
        last_return = standard.sample(&mut rng) * volatility.min(0.03);
        let walked = prices[i - 1] * (1.0 + last_return);
        prices[i] = 0.98 * walked + 0.02 * base[i];
    }

    for &(year, month, day, multiplier, ..) in SHOCKS.iter() {
        let event = ymd(year, month, day);
        let Some(idx) = closest_index(&dates, event) else {
            continue;
        };
        let lo = idx.saturating_sub(5);
        let hi = (idx + 15).min(dates.len());
        for (j, price) in prices.iter_mut().enumerate().take(hi).skip(lo) {
            let distance = j.abs_diff(idx) as f64;
            *price *= 1.0 + (multiplier - 1.0) * (-distance / 5.0).exp();
        }
    }

    Ok(dates
        .iter()
        .zip(prices)
        .map(|(date, price)| {
            let clamped = price.clamp(era_floor(*date), 150.0);
            PricePoint::new(*date, (clamped * 100.0).round() / 100.0)
        })
        .collect())
}

fn closest_index(dates: &[NaiveDate], target: NaiveDate) -> Option<usize> {
    dates
        .iter()
        .enumerate()
        .min_by_key(|(_, d)| (**d - target).num_days().abs())
        .map(|(i, _)| i)
}

pub fn default_events() -> Vec<Event> {
    SHOCKS
        .iter()
        .map(|&(year, month, day, multiplier, name, category, level)| Event {
            date: ymd(year, month, day),
            name: name.to_string(),
            description: format!(
                "{} (modelled as a {:+.0}% price shock)",
                name,
                (multiplier - 1.0) * 100.0
            ),
            category: category.to_string(),
            impact_level: level.to_string(),
        })
        .collect()
}

/// Brent CSV layout: `Date,Price` with `20-May-87` style dates.
pub fn write_prices_csv(path: &Path, prices: &[PricePoint]) -> Result<()> {
    let mut writer = Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    writer.write_record(["Date", "Price"])?;
    for p in prices {
        writer.write_record([p.date.format("%d-%b-%y").to_string(), format!("{:.2}", p.price)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_events_csv(path: &Path, events: &[Event]) -> Result<()> {
    let mut writer = Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    writer.write_record(["Date", "Event", "Description", "Category", "Impact_Level"])?;
    for e in events {
        writer.write_record([
            e.date.format("%Y-%m-%d").to_string(),
            e.name.clone(),
            e.description.clone(),
            e.category.clone(),
            e.impact_level.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
