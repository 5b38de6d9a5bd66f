//! tsindex Record Store
//!
//! The persistence layer the index sits beside. The index never reads it
//! directly; the orchestrator talks to it through [`RecordStore`]:
//!
//! - **types**: Reading, Record, RecordId, RecordFilter, timestamp helpers
//! - **sqlite**: SQLite-backed store (the `climate_data` table)
//! - **memory**: in-memory store for tests and ephemeral use
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Reading → RecordStore::append → RecordId → index insert
//!
//! Read Path:
//!   [start, end] → index → RecordIds → RecordStore::fetch_many → Records
//! ```

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
    format_timestamp, parse_timestamp, Reading, Record, RecordFilter, RecordId, TIMESTAMP_FORMAT,
};

/// Persisted record storage consumed by the orchestrator
pub trait RecordStore {
    /// Durably store a reading and return a fresh, never-used identifier
    fn append(&mut self, reading: &Reading) -> StoreResult<RecordId>;

    /// Records for the given ids, in ascending id order.
    ///
    /// Missing ids are silently omitted. Fails only when the store cannot
    /// serve the request at all.
    fn fetch_many(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>>;

    /// Overwrite a record's value. Returns `false` if the id is unknown.
    fn update_value(&mut self, id: RecordId, value: f64) -> StoreResult<bool>;

    /// Remove a record. Returns `false` if the id is unknown.
    fn delete(&mut self, id: RecordId) -> StoreResult<bool>;

    /// Every stored record, ordered by (timestamp, id)
    fn scan_all(&self) -> StoreResult<Vec<Record>>;

    fn count(&self) -> StoreResult<u64>;
}

