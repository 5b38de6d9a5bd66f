//! Orchestrator error types

use crate::index::IndexError;
use crate::storage::StoreError;
use thiserror::Error;

/// Errors surfaced by [`TimeSeriesDb`](crate::db::TimeSeriesDb) and the index service
#[derive(Error, Debug)]
pub enum DbError {
    /// Record store failed; propagated unchanged
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Index rejected the operation
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Timestamp string could not be parsed
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Unknown aggregation function
    #[error("Invalid aggregation type '{0}': choose from avg, sum, min, max")]
    InvalidAggregation(String),

    /// Unknown downsampling interval
    #[error("Invalid interval '{0}': choose from hourly, daily")]
    InvalidInterval(String),

    /// Time range too wide to bucket
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// The index service worker has stopped
    #[error("Index service is not running")]
    ServiceClosed,
}

/// Result type for orchestrator operations
pub type DbResult<T> = Result<T, DbError>;
