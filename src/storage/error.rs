//! Record store error types
//!
//! Defines all errors that can occur in the persistence layer.

use thiserror::Error;

/// Errors that can occur in a record store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store cannot serve requests at all
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
