//! Core data types for the record store
//!
//! - `Reading`: one climate measurement, the payload handed to the store
//! - `Record`: a stored reading with its assigned identifier
//! - `RecordId`: opaque identifier returned by the store
//! - `RecordFilter`: optional station/metric filter applied after hydration

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format accepted at the edges (`2024-03-01 14:05:00`, UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Opaque handle assigned by the store on append
///
/// Only compared for equality and carried as the index payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single climate measurement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Unix timestamp in milliseconds (UTC)
    pub timestamp: i64,
    /// Reporting station (e.g., "Station_1")
    pub station_id: String,
    /// What was measured (e.g., "temperature", "humidity")
    pub metric_name: String,
    /// The measured value
    pub value: f64,
    #[serde(default)]
    pub location: Option<String>,
    /// Free-form comma separated tags
    #[serde(default)]
    pub tags: Option<String>,
}

impl Reading {
    pub fn new(
        timestamp: i64,
        station_id: impl Into<String>,
        metric_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            timestamp,
            station_id: station_id.into(),
            metric_name: metric_name.into(),
            value,
            location: None,
            tags: None,
        }
    }

    /// Builder method: set location
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method: set tags
    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }
}

/// A reading as persisted, with its store-assigned identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub reading: Reading,
}

/// Post-hydration filter for range queries
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub station_id: Option<String>,
    pub metric_name: Option<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn station(mut self, station_id: impl Into<String>) -> Self {
        self.station_id = Some(station_id.into());
        self
    }

    pub fn metric(mut self, metric_name: impl Into<String>) -> Self {
        self.metric_name = Some(metric_name.into());
        self
    }

    /// Check if a record matches this filter
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(station) = &self.station_id {
            if &record.reading.station_id != station {
                return false;
            }
        }
        if let Some(metric) = &self.metric_name {
            if &record.reading.metric_name != metric {
                return false;
            }
        }
        true
    }
}

/// Parse a timestamp given as `YYYY-MM-DD HH:MM:SS` (UTC), RFC 3339, or Unix
/// milliseconds.
pub fn parse_timestamp(input: &str) -> Option<i64> {
    let input = input.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc().timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp_millis());
    }
    input.parse::<i64>().ok()
}

/// Render Unix milliseconds as `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| millis.to_string())
}
