//! tsindex Ingest/Query Orchestrator
//!
//! Keeps the in-memory B+Tree consistent with the record store and turns
//! range lookups into hydrated records:
//!
//! ```text
//! record(reading):  store.append ──ok──▶ RecordId ──▶ index.insert(ts, id)
//!                        └──err──▶ returned as-is, index untouched
//!
//! query(start, end): index.range_query ──▶ [RecordId] ──▶ store.fetch_many
//! ```
//!
//! Store I/O happens strictly before (append) or after (fetch) tree access,
//! so a failing store never leaves the tree partially mutated.

mod aggregate;
mod error;

pub use aggregate::{downsample, window_count, AggregationType, Bucket, Interval, MAX_BUCKETS};
pub use error::{DbError, DbResult};

use crate::config::IndexConfig;
use crate::index::{BPlusTree, IndexStats, SeparatorPolicy};
use crate::storage::{Reading, Record, RecordFilter, RecordId, RecordStore};
use serde::Serialize;

/// Snapshot of orchestrator state
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub index: IndexStats,
    /// Records currently in the store
    pub records: u64,
    /// Timestamp of the most recently recorded reading
    pub last_timestamp: Option<i64>,
}

/// Time-series database: a record store plus its timestamp index
pub struct TimeSeriesDb<S> {
    store: S,
    index: BPlusTree<i64, RecordId>,
    /// Last timestamp seen on ingest; informational only, never used to
    /// answer queries
    last_timestamp: Option<i64>,
}

impl<S: RecordStore> TimeSeriesDb<S> {
    /// Wrap a store with an empty index
    pub fn new(store: S, order: usize, policy: SeparatorPolicy) -> DbResult<Self> {
        Ok(Self {
            store,
            index: BPlusTree::with_policy(order, policy)?,
            last_timestamp: None,
        })
    }

    /// Wrap a store and, if configured, rebuild the index from its contents.
    ///
    /// The index is memory-resident; without a rebuild a reopened store
    /// answers every range query with nothing.
    pub fn open(store: S, config: &IndexConfig) -> DbResult<Self> {
        let mut db = Self::new(store, config.order, config.separator_policy)?;
        if config.rebuild_on_startup {
            db.rebuild()?;
        } else {
            tracing::warn!("Index rebuild disabled; existing records are not indexed");
        }
        Ok(db)
    }

    /// Replay every stored record through the index
    pub fn rebuild(&mut self) -> DbResult<usize> {
        let records = self.store.scan_all()?;

        self.index.clear();
        self.last_timestamp = None;
        for record in &records {
            self.index.insert(record.reading.timestamp, record.id)?;
            self.last_timestamp = Some(record.reading.timestamp);
        }

        tracing::info!(
            records = records.len(),
            height = self.index.height(),
            "Rebuilt timestamp index from store"
        );
        Ok(records.len())
    }

    /// Store a reading, then index it.
    ///
    /// The index gains an entry if and only if the append succeeded.
    pub fn record(&mut self, reading: &Reading) -> DbResult<RecordId> {
        let id = self.store.append(reading)?;

        if let Err(e) = self.index.insert(reading.timestamp, id) {
            tracing::error!(id = %id, "Stored record could not be indexed: {}", e);
            return Err(e.into());
        }
        self.last_timestamp = Some(reading.timestamp);

        tracing::debug!(id = %id, timestamp = reading.timestamp, "Recorded reading");
        Ok(id)
    }

    /// Identifiers of every entry with `start <= timestamp <= end`, in
    /// timestamp order. `start > end` yields nothing.
    pub fn find_ids(&self, start: i64, end: i64) -> Vec<RecordId> {
        self.index
            .range_query(&start, &end)
            .into_iter()
            .map(|(_, id)| id)
            .collect()
    }

    /// Records with `start <= timestamp <= end`.
    ///
    /// Returned in the store's order, not necessarily timestamp order. An
    /// empty range returns an empty list without touching the store.
    pub fn query(&self, start: i64, end: i64) -> DbResult<Vec<Record>> {
        let ids = self.find_ids(start, end);
        tracing::debug!(start, end, hits = ids.len(), "Range query");

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.fetch_many(&ids)?)
    }

    /// [`query`](Self::query) narrowed by station and/or metric
    pub fn query_filtered(
        &self,
        start: i64,
        end: i64,
        filter: &RecordFilter,
    ) -> DbResult<Vec<Record>> {
        let mut records = self.query(start, end)?;
        records.retain(|r| filter.matches(r));
        Ok(records)
    }

    /// Overwrite a record's value. The timestamp, and so the index entry,
    /// is unchanged.
    pub fn update_value(&mut self, id: RecordId, value: f64) -> DbResult<bool> {
        Ok(self.store.update_value(id, value)?)
    }

    /// Delete a record from the store and drop its index entry
    pub fn delete(&mut self, id: RecordId) -> DbResult<bool> {
        let Some(record) = self.store.fetch_many(&[id])?.into_iter().next() else {
            return Ok(false);
        };

        if !self.store.delete(id)? {
            return Ok(false);
        }

        if !self.index.remove(&record.reading.timestamp, &id) {
            tracing::warn!(id = %id, "Deleted record had no index entry");
        }
        Ok(true)
    }

    /// Aggregate `metric` values over `[start, end]`; 0.0 when nothing
    /// matches.
    pub fn aggregate(
        &self,
        start: i64,
        end: i64,
        metric: &str,
        aggregation: AggregationType,
    ) -> DbResult<f64> {
        let values: Vec<f64> = self
            .query_filtered(start, end, &RecordFilter::new().metric(metric))?
            .iter()
            .map(|r| r.reading.value)
            .collect();

        Ok(aggregation.aggregate(&values).unwrap_or(0.0))
    }

    /// Average `metric` into hourly or daily buckets starting at `start`
    pub fn downsample(
        &self,
        start: i64,
        end: i64,
        metric: &str,
        interval: Interval,
    ) -> DbResult<Vec<Bucket>> {
        let windows = aggregate::window_count(start, end, interval)?;
        if windows == 0 {
            return Ok(Vec::new());
        }

        // Cover the whole last window, not just up to `end`
        let covered = windows as i64 * interval.step_millis() - 1;
        let last = start.saturating_add(covered);

        let records = self.query_filtered(start, last, &RecordFilter::new().metric(metric))?;
        downsample(&records, start, end, interval)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    /// Read access to the timestamp index
    pub fn index(&self) -> &BPlusTree<i64, RecordId> {
        &self.index
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> DbResult<DbStats> {
        Ok(DbStats {
            index: self.index.stats(),
            records: self.store.count()?,
            last_timestamp: self.last_timestamp,
        })
    }
}
