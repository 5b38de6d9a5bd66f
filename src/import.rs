//! CSV Import
//!
//! Bulk-loads readings from CSV files with a header row:
//!
//! ```text
//! timestamp,station_id,metric_name,value,location,tags
//! 2024-03-01 14:05:00,Station_1,temperature,22.5,New York,urban
//! ```
//!
//! `location` and `tags` may be omitted or left empty. Timestamps accept
//! anything [`parse_timestamp`] does. Bad rows are reported, not fatal.

use crate::storage::{parse_timestamp, Reading};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Errors reported beyond this many are summarized in one line
const MAX_REPORTED_ERRORS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Readings parsed from a CSV source
#[derive(Debug, Default)]
pub struct ImportResult {
    pub readings: Vec<Reading>,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    station_id: String,
    metric_name: String,
    value: f64,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    tags: Option<String>,
}

/// Parse readings from a CSV file
pub fn import_path(path: &Path) -> Result<ImportResult, ImportError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    collect(reader)
}

/// Parse readings from any CSV source
pub fn import_reader<R: Read>(source: R) -> Result<ImportResult, ImportError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    collect(reader)
}

/// Line a row starts on; quoted fields may span several lines
fn line_of(position: Option<&csv::Position>) -> String {
    position
        .map(|p| p.line().to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<ImportResult, ImportError> {
    let headers = reader.headers()?.clone();
    let mut result = ImportResult::default();

    for row in reader.records() {
        let record = match row {
            Ok(record) => record,
            Err(e) => {
                result
                    .errors
                    .push(format!("Line {}: {}", line_of(e.position()), e));
                result.rows_failed += 1;
                continue;
            }
        };
        let line = line_of(record.position());

        let row: CsvRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                result.errors.push(format!("Line {}: {}", line, e));
                result.rows_failed += 1;
                continue;
            }
        };

        let Some(timestamp) = parse_timestamp(&row.timestamp) else {
            result
                .errors
                .push(format!("Line {}: unrecognized timestamp {:?}", line, row.timestamp));
            result.rows_failed += 1;
            continue;
        };

        let mut reading = Reading::new(timestamp, row.station_id, row.metric_name, row.value);
        reading.location = row.location.filter(|s| !s.is_empty());
        reading.tags = row.tags.filter(|s| !s.is_empty());
        result.readings.push(reading);
    }

    if result.errors.len() > MAX_REPORTED_ERRORS {
        let total = result.errors.len();
        result.errors.truncate(MAX_REPORTED_ERRORS);
        result
            .errors
            .push(format!("... and {} more errors", total - MAX_REPORTED_ERRORS));
    }

    tracing::debug!(
        parsed = result.readings.len(),
        failed = result.rows_failed,
        "Parsed CSV readings"
    );
    Ok(result)
}
