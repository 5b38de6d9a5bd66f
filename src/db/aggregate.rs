//! Aggregation and downsampling over index-selected records
//!
//! Both operate on records already narrowed by a range query, so every
//! time-window computation goes through the index.

use crate::db::error::DbError;
use crate::storage::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const HOUR_MILLIS: i64 = 3_600 * 1_000;
const DAY_MILLIS: i64 = 24 * HOUR_MILLIS;

/// How to fold a window of values into one number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    #[default]
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregationType {
    /// Aggregate a slice of values according to this type
    pub fn aggregate(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        Some(match self {
            AggregationType::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregationType::Sum => values.iter().sum(),
            AggregationType::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            AggregationType::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

impl std::str::FromStr for AggregationType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avg" | "average" => Ok(AggregationType::Avg),
            "sum" => Ok(AggregationType::Sum),
            "min" => Ok(AggregationType::Min),
            "max" => Ok(AggregationType::Max),
            _ => Err(DbError::InvalidAggregation(s.to_string())),
        }
    }
}

impl std::fmt::Display for AggregationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationType::Avg => write!(f, "avg"),
            AggregationType::Sum => write!(f, "sum"),
            AggregationType::Min => write!(f, "min"),
            AggregationType::Max => write!(f, "max"),
        }
    }
}

/// Downsampling bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Hourly,
    Daily,
}

impl Interval {
    pub fn step_millis(&self) -> i64 {
        match self {
            Interval::Hourly => HOUR_MILLIS,
            Interval::Daily => DAY_MILLIS,
        }
    }

    /// Label format for a bucket start, truncated to the interval
    fn label_format(&self) -> &'static str {
        match self {
            Interval::Hourly => "%Y-%m-%d %H:00:00",
            Interval::Daily => "%Y-%m-%d 00:00:00",
        }
    }

    pub fn label(&self, millis: i64) -> String {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|dt| dt.format(self.label_format()).to_string())
            .unwrap_or_else(|| millis.to_string())
    }
}

impl std::str::FromStr for Interval {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Ok(Interval::Hourly),
            "daily" | "day" => Ok(Interval::Daily),
            _ => Err(DbError::InvalidInterval(s.to_string())),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::Hourly => write!(f, "hourly"),
            Interval::Daily => write!(f, "daily"),
        }
    }
}

/// One downsampled window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    /// Bucket start, truncated to the interval
    pub timestamp: String,
    /// Average over the bucket; 0.0 when the bucket is empty
    pub value: f64,
    /// Number of readings that fell in the bucket
    pub count: usize,
}

/// Most buckets a single downsample may produce
pub const MAX_BUCKETS: usize = 10_000;

/// Number of `[t, t + step)` windows starting at `start` with `t <= end`.
///
/// Zero when `start > end`. Fails when the span overflows `i64` or needs more
/// than [`MAX_BUCKETS`] windows.
pub fn window_count(start: i64, end: i64, interval: Interval) -> Result<usize, DbError> {
    if start > end {
        return Ok(0);
    }

    let span = end
        .checked_sub(start)
        .ok_or_else(|| DbError::InvalidRange(format!("span from {} to {} overflows", start, end)))?;
    let windows = span / interval.step_millis() + 1;

    match usize::try_from(windows) {
        Ok(count) if count <= MAX_BUCKETS => Ok(count),
        _ => Err(DbError::InvalidRange(format!(
            "{} {} buckets requested, at most {} allowed",
            windows, interval, MAX_BUCKETS
        ))),
    }
}

/// Average `records` into consecutive `[t, t + step)` windows starting at
/// `start`, for every window start `t <= end`.
///
/// `records` must already be restricted to the metric of interest.
pub fn downsample(
    records: &[Record],
    start: i64,
    end: i64,
    interval: Interval,
) -> Result<Vec<Bucket>, DbError> {
    let step = interval.step_millis();
    let window_count = window_count(start, end, interval)?;

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); window_count];
    for record in records {
        let Some(offset) = record.reading.timestamp.checked_sub(start) else {
            continue;
        };
        if offset < 0 {
            continue;
        }
        if let Some(window) = values.get_mut((offset / step) as usize) {
            window.push(record.reading.value);
        }
    }

    let mut buckets = Vec::with_capacity(window_count);
    for (i, window) in values.iter().enumerate() {
        // Bounded by `end` since i < window_count
        let Some(bucket_start) = (i as i64)
            .checked_mul(step)
            .and_then(|offset| start.checked_add(offset))
        else {
            break;
        };
        buckets.push(Bucket {
            timestamp: interval.label(bucket_start),
            value: AggregationType::Avg.aggregate(window).unwrap_or(0.0),
            count: window.len(),
        });
    }

    Ok(buckets)
}
