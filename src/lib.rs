//! # tsindex
//!
//! Time-series indexing for climate readings. An in-memory B+Tree maps
//! timestamps to record identifiers so that time-range queries never scan
//! the whole record store.
//!
//! ## Modules
//!
//! - [`index`]: B+Tree over `(timestamp, RecordId)` with range queries
//! - [`storage`]: record stores (SQLite and in-memory)
//! - [`db`]: orchestrator keeping the index and the store in step
//! - [`service`]: serialized async access to a database
//! - [`import`]: CSV bulk loading
//! - [`config`], [`logging`]: ambient setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsindex::{Config, Reading, SqliteStore, TimeSeriesDb};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let store = SqliteStore::open(config.storage.resolved_db_path())?;
//!     let mut db = TimeSeriesDb::open(store, &config.index)?;
//!
//!     db.record(&Reading::new(1_709_301_900_000, "Station_1", "temperature", 22.5))?;
//!
//!     let records = db.query(1_709_251_200_000, 1_709_337_599_999)?;
//!     println!("Found {} readings", records.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod import;
pub mod index;
pub mod logging;
pub mod service;
pub mod storage;

pub use config::{Config, ConfigError, IndexConfig, LoggingConfig, StorageConfig};

pub use db::{AggregationType, Bucket, DbError, DbResult, DbStats, Interval, TimeSeriesDb};

pub use index::{BPlusTree, IndexError, IndexResult, IndexStats, SeparatorPolicy};

pub use service::{IndexHandle, IndexService};

pub use storage::{
    MemoryStore, Reading, Record, RecordFilter, RecordId, RecordStore, SqliteStore, StoreError,
    StoreResult,
};
