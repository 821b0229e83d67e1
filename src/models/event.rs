use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::price_point::format_date;

/// A dated geopolitical or market event (conflict, sanction, OPEC decision, ...).
///
/// Several events may share one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(with = "iso_date")]
    pub date: NaiveDate,
    #[serde(rename = "event")]
    pub name: String,
    pub description: String,
    pub category: String,
    pub impact_level: String,
}

/// Optional event filters. `None` means "no constraint"; `Some("")` filters
/// for an empty category, which is a different request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub category: Option<String>,
    pub impact_level: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(category) = &self.category {
            if &event.category != category {
                return false;
            }
        }
        if let Some(level) = &self.impact_level {
            if &event.impact_level != level {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if event.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.date > end {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
    pub impact_levels: Vec<String>,
}

pub(crate) mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::format_date;

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(serde::de::Error::custom)
    }
}
