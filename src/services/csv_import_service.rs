use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::models::{Event, PricePoint};
use crate::store::SeriesStore;

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Price")]
    price: String,
}

#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Event")]
    event: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Impact_Level")]
    impact_level: String,
}

/// Price files use `20-May-87`; ISO dates and four-digit years are accepted too.
fn parse_price_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    ["%d-%b-%y", "%d-%b-%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .with_context(|| format!("Failed to parse price date: {}", s))
}

fn parse_price(s: &str) -> Result<f64> {
    let cleaned = s.replace(['$', ','], "");
    let price: f64 = cleaned
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse price: {}", s))?;
    if !price.is_finite() || price <= 0.0 {
        anyhow::bail!("Price must be positive, got {}", s);
    }
    Ok(price)
}

pub fn read_prices<R: Read>(reader: R) -> Result<Vec<PricePoint>> {
    let mut reader = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);

    reader
        .deserialize::<PriceRow>()
        .enumerate()
        .map(|(line, row)| {
            // +2: header line and 1-based numbering
            let row = row.with_context(|| format!("Malformed price row at line {}", line + 2))?;
            let date = parse_price_date(&row.date).with_context(|| format!("line {}", line + 2))?;
            let price = parse_price(&row.price).with_context(|| format!("line {}", line + 2))?;
            Ok(PricePoint::new(date, price))
        })
        .collect()
}

pub fn read_events<R: Read>(reader: R) -> Result<Vec<Event>> {
    let mut reader = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);

    reader
        .deserialize::<EventRow>()
        .enumerate()
        .map(|(line, row)| {
            let row = row.with_context(|| format!("Malformed event row at line {}", line + 2))?;
            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
                .with_context(|| format!("Failed to parse event date '{}' at line {}", row.date, line + 2))?;
            Ok(Event {
                date,
                name: row.event,
                description: row.description,
                category: row.category,
                impact_level: row.impact_level,
            })
        })
        .collect()
}

pub fn load_prices(path: &Path) -> Result<Vec<PricePoint>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open price file: {:?}", path))?;
    read_prices(file).with_context(|| format!("Failed to load prices from {:?}", path))
}

pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open event file: {:?}", path))?;
    read_events(file).with_context(|| format!("Failed to load events from {:?}", path))
}

/// Build the process-wide store. A missing event file leaves the event list
/// empty; a missing or invalid price file is fatal.
pub fn load_store(prices_path: &Path, events_path: &Path) -> Result<SeriesStore> {
    let prices = load_prices(prices_path)?;
    let events = if events_path.exists() {
        load_events(events_path)?
    } else {
        warn!("Event file {:?} not found; starting with no events", events_path);
        Vec::new()
    };

    let store = SeriesStore::new(prices, events).context("Invalid price series")?;
    info!(
        "Loaded {} prices ({} to {}) and {} events",
        store.len(),
        store.first_date(),
        store.last_date(),
        store.events().len()
    );
    Ok(store)
}
